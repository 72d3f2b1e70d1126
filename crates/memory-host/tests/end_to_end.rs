//! Generation passes driven through `MemoryHost` with real registries.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use memory_host::{
    Compilation, Declaration, FailureSource, HostError, MemoryHost, MemoryInit, SideInput,
};
use pipeline::{
    ArtifactName, BuiltPipelines, CancellationToken, Diagnostic, DiagnosticDescriptor,
    DiagnosticId, DiagnosticSeverity, EquatableSequence, Location, OutputError, PipelineRegistry,
    ResultOrDiagnostic, SyntaxContext,
};

#[derive(Debug, Clone, PartialEq)]
struct CodeModel {
    name: String,
    code: String,
}

fn diagnostic_id(value: &str) -> DiagnosticId {
    DiagnosticId::new(value).expect("non-empty")
}

fn artifact(name: impl Into<String>) -> ArtifactName {
    ArtifactName::new(name).expect("non-empty")
}

fn coded(key: &str, name: &str, code: &str) -> Declaration {
    Declaration::new(key, "enum", name, Location::new("codes.decl", 3, 1))
        .with_attribute("code", code)
}

fn compilation(declarations: Vec<Declaration>) -> Compilation {
    Compilation::new("demo").with_declarations(declarations)
}

/// Declares the uppercase-code validator. `runs` counts output invocations;
/// an output for a declaration named `Broken` fails.
fn declare_codes(registry: &mut PipelineRegistry<MemoryInit>, runs: Arc<AtomicUsize>) {
    registry
        .filter_pipeline::<CodeModel>()
        .filter(|node: &Declaration, _| node.attribute("code").is_some())
        .transform(|ctx, _| {
            let node = ctx.node();
            let code = node.attribute("code").unwrap_or_default().to_string();
            if code.chars().any(char::is_lowercase) {
                return ResultOrDiagnostic::fail(
                    Diagnostic::new(
                        diagnostic_id("GEN001"),
                        DiagnosticSeverity::Error,
                        format!("code '{code}' of '{}' must be uppercase", node.name),
                    )
                    .with_location(node.location.clone()),
                );
            }
            ResultOrDiagnostic::success(CodeModel {
                name: node.name.clone(),
                code,
            })
        })
        .output(move |sink, model, _| {
            runs.fetch_add(1, Ordering::SeqCst);
            if model.name == "Broken" {
                return Err(OutputError::message("template for 'Broken' is missing"));
            }
            sink.add_artifact(
                artifact(format!("{}.g.rs", model.name)),
                format!("pub const CODE: &str = \"{}\";", model.code),
            )
        })
        .register()
        .expect("pipeline should register");
}

fn propagating(runs: Arc<AtomicUsize>) -> BuiltPipelines<MemoryInit> {
    let mut registry = PipelineRegistry::new();
    declare_codes(&mut registry, runs);
    registry.build()
}

fn reporting(runs: Arc<AtomicUsize>) -> BuiltPipelines<MemoryInit> {
    let mut registry = PipelineRegistry::with_default_diagnostic(
        DiagnosticDescriptor::output_failure(diagnostic_id("GEN999"), "Generation failed"),
    );
    declare_codes(&mut registry, runs);
    registry.build()
}

fn counter() -> Arc<AtomicUsize> {
    Arc::new(AtomicUsize::new(0))
}

#[test]
fn run_lowercase_code_expected_single_diagnostic_and_no_artifact() {
    let mut host = MemoryHost::new(&propagating(counter()));

    let report = host
        .run(&compilation(vec![coded("1", "Color", "col")]), &CancellationToken::new())
        .expect("pass should complete");

    assert_eq!(report.diagnostics.len(), 1);
    let diagnostic = &report.diagnostics[0];
    assert_eq!(diagnostic.id.as_str(), "GEN001");
    assert_eq!(diagnostic.location, Some(Location::new("codes.decl", 3, 1)));
    assert!(report.artifacts.is_empty());
    assert!(report.has_errors());
}

#[test]
fn run_uppercase_code_expected_artifact_embedding_value() {
    let mut host = MemoryHost::new(&propagating(counter()));

    let report = host
        .run(&compilation(vec![coded("1", "Color", "COL")]), &CancellationToken::new())
        .expect("pass should complete");

    assert!(report.diagnostics.is_empty());
    assert_eq!(report.artifacts.len(), 1);
    let content = report.artifact("Color.g.rs").expect("artifact should exist");
    assert!(content.contains("\"COL\""));
}

#[test]
fn run_filtered_out_declaration_expected_no_transform() {
    let mut host = MemoryHost::new(&propagating(counter()));
    let plain = Declaration::new("1", "record", "Person", Location::new("a.decl", 1, 1));

    let report = host
        .run(&compilation(vec![plain]), &CancellationToken::new())
        .expect("pass should complete");

    assert_eq!(report.stats.transforms_run, 0);
    assert!(report.artifacts.is_empty());
    assert!(report.diagnostics.is_empty());
}

#[test]
fn run_output_error_with_default_descriptor_expected_diagnostic_and_siblings_unaffected() {
    let mut host = MemoryHost::new(&reporting(counter()));

    let report = host
        .run(
            &compilation(vec![
                coded("1", "Color", "COL"),
                coded("2", "Broken", "BRK"),
                coded("3", "Shape", "SHP"),
            ]),
            &CancellationToken::new(),
        )
        .expect("pass should complete");

    let reported: Vec<_> = report.diagnostics_with_id(&diagnostic_id("GEN999")).collect();
    assert_eq!(reported.len(), 1);
    assert_eq!(reported[0].message, "template for 'Broken' is missing");
    assert!(report.artifact("Broken.g.rs").is_none());
    assert!(report.artifact("Color.g.rs").is_some());
    assert!(report.artifact("Shape.g.rs").is_some());
    assert!(report.failures.is_empty());
}

#[test]
fn run_output_error_without_default_descriptor_expected_failure_recorded() {
    let mut host = MemoryHost::new(&propagating(counter()));

    let report = host
        .run(
            &compilation(vec![coded("1", "Broken", "BRK"), coded("2", "Color", "COL")]),
            &CancellationToken::new(),
        )
        .expect("pass should complete");

    assert_eq!(report.failures.len(), 1);
    assert_eq!(
        report.failures[0].source,
        FailureSource::Reaction {
            index: 0,
            node: Some("1".to_string())
        }
    );
    assert!(report.failures[0].message.contains("Broken"));
    assert!(report.diagnostics.is_empty());
    assert!(report.artifact("Color.g.rs").is_some());
}

#[test]
fn run_output_panic_without_default_descriptor_expected_failure_recorded() {
    let mut registry = PipelineRegistry::<MemoryInit>::new();
    registry
        .filter_pipeline::<String>()
        .filter(|_, _| true)
        .transform(|ctx, _| ResultOrDiagnostic::success(ctx.node().name.clone()))
        .output(|sink, name, _| {
            if name == "Bad" {
                panic!("renderer exploded");
            }
            sink.add_artifact(artifact(format!("{name}.g.rs")), String::new())
        })
        .register()
        .expect("pipeline should register");
    let mut host = MemoryHost::new(&registry.build());

    let report = host
        .run(
            &compilation(vec![
                Declaration::new("1", "record", "Bad", Location::new("a.decl", 1, 1)),
                Declaration::new("2", "record", "Good", Location::new("a.decl", 2, 1)),
            ]),
            &CancellationToken::new(),
        )
        .expect("pass should complete");

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].message, "renderer exploded");
    assert!(report.artifact("Good.g.rs").is_some());
}

#[test]
fn run_fresh_sessions_same_unit_expected_identical_output() {
    let built = reporting(counter());
    let input = compilation(vec![
        coded("1", "Color", "COL"),
        coded("2", "Shape", "shp"),
        coded("3", "Broken", "BRK"),
    ]);

    let first = MemoryHost::new(&built)
        .run(&input, &CancellationToken::new())
        .expect("pass should complete");
    let second = MemoryHost::new(&built.clone())
        .run(&input, &CancellationToken::new())
        .expect("pass should complete");

    assert_ne!(first.session_id, second.session_id);
    assert_eq!(first.artifacts, second.artifacts);
    assert_eq!(first.diagnostics, second.diagnostics);
}

#[test]
fn run_unchanged_models_expected_outputs_replayed() {
    let runs = counter();
    let mut host = MemoryHost::new(&reporting(Arc::clone(&runs)));
    let input = compilation(vec![coded("1", "Color", "COL"), coded("2", "Broken", "BRK")]);
    let cancel = CancellationToken::new();

    let first = host.run(&input, &cancel).expect("first pass");
    let second = host.run(&input, &cancel).expect("second pass");

    assert_eq!(runs.load(Ordering::SeqCst), 2);
    assert_eq!(second.pass, 2);
    assert_eq!(second.stats.transforms_run, 2);
    assert_eq!(second.stats.outputs_run, 0);
    assert_eq!(second.stats.outputs_replayed, 2);
    assert_eq!(first.artifacts, second.artifacts);
    assert_eq!(first.diagnostics, second.diagnostics);
}

#[test]
fn run_one_declaration_edited_expected_only_its_output_rerun() {
    let runs = counter();
    let mut host = MemoryHost::new(&propagating(Arc::clone(&runs)));
    let cancel = CancellationToken::new();

    host.run(
        &compilation(vec![coded("1", "Color", "COL"), coded("2", "Shape", "SHP")]),
        &cancel,
    )
    .expect("first pass");
    let report = host
        .run(
            &compilation(vec![coded("1", "Color", "CLR"), coded("2", "Shape", "SHP")]),
            &cancel,
        )
        .expect("second pass");

    assert_eq!(runs.load(Ordering::SeqCst), 3);
    assert_eq!(report.stats.outputs_run, 1);
    assert_eq!(report.stats.outputs_replayed, 1);
    assert!(report
        .artifact("Color.g.rs")
        .is_some_and(|content| content.contains("CLR")));
}

#[derive(Debug, Clone, PartialEq)]
struct Manifest {
    paths: EquatableSequence<String>,
}

#[test]
fn run_null_then_empty_side_inputs_expected_output_not_rerun() {
    let runs = counter();
    let counted = Arc::clone(&runs);
    let mut registry = PipelineRegistry::<MemoryInit>::new();
    registry
        .single_value_pipeline(|init: &mut MemoryInit| init.side_inputs())
        .transform(|inputs: &EquatableSequence<SideInput>, _| {
            ResultOrDiagnostic::success(Manifest {
                paths: inputs.iter().map(|input| input.path.clone()).collect(),
            })
        })
        .output(move |sink, manifest: &Manifest, _| {
            counted.fetch_add(1, Ordering::SeqCst);
            sink.add_artifact(artifact("Manifest.g.rs"), manifest.paths.join("\n"))
        })
        .register()
        .expect("pipeline should register");
    let mut host = MemoryHost::new(&registry.build());
    let cancel = CancellationToken::new();

    let absent = Compilation::from_json(r#"{"assembly_name":"demo","side_inputs":null}"#)
        .expect("json should parse");
    let empty = Compilation::from_json(r#"{"assembly_name":"demo","side_inputs":[]}"#)
        .expect("json should parse");
    host.run(&absent, &cancel).expect("first pass");
    let report = host.run(&empty, &cancel).expect("second pass");

    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(report.stats.outputs_replayed, 1);
    assert_eq!(report.artifact("Manifest.g.rs"), Some(""));
}

#[test]
fn run_post_initialization_expected_marker_every_pass_action_once() {
    let runs = counter();
    let counted = Arc::clone(&runs);
    let mut registry = PipelineRegistry::<MemoryInit>::new();
    registry.add_post_initialization(move |sink, _| {
        counted.fetch_add(1, Ordering::SeqCst);
        sink.add_artifact(artifact("Marker.g.rs"), "pub struct GeneratedMarker;".to_string())
    });
    let mut host = MemoryHost::new(&registry.build());
    let cancel = CancellationToken::new();

    let first = host.run(&Compilation::new("demo"), &cancel).expect("first pass");
    let second = host.run(&Compilation::new("demo"), &cancel).expect("second pass");

    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert!(first.artifact("Marker.g.rs").is_some());
    assert!(second.artifact("Marker.g.rs").is_some());
}

#[test]
fn run_two_pipelines_same_artifact_name_expected_duplicate_failure() {
    let mut registry = PipelineRegistry::<MemoryInit>::new();
    for _ in 0..2 {
        registry
            .filter_pipeline::<String>()
            .filter(|_, _| true)
            .transform(|ctx, _| ResultOrDiagnostic::success(ctx.node().name.clone()))
            .output(|sink, name, _| sink.add_artifact(artifact(format!("{name}.g.rs")), String::new()))
            .register()
            .expect("pipeline should register");
    }
    let mut host = MemoryHost::new(&registry.build());

    let report = host
        .run(
            &compilation(vec![Declaration::new("1", "record", "Person", Location::new("a.decl", 1, 1))]),
            &CancellationToken::new(),
        )
        .expect("pass should complete");

    assert_eq!(report.artifacts.len(), 1);
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].message.contains("Person.g.rs"));
}

#[test]
fn run_replayed_output_name_taken_earlier_in_pass_expected_nothing_replayed() {
    let runs = counter();
    let counted = Arc::clone(&runs);
    let mut registry = PipelineRegistry::<MemoryInit>::new();
    registry
        .filter_pipeline::<String>()
        .filter(|_, _| true)
        .transform(|ctx, _| ResultOrDiagnostic::success(ctx.node().name.clone()))
        .output(|sink, name, _| sink.add_artifact(artifact(format!("{name}.g.rs")), String::new()))
        .register()
        .expect("pipeline should register");
    registry
        .single_value_pipeline(|init: &mut MemoryInit| init.side_inputs())
        .transform(|inputs: &EquatableSequence<SideInput>, _| ResultOrDiagnostic::success(inputs.len()))
        .output(move |sink, count: &usize, _| {
            counted.fetch_add(1, Ordering::SeqCst);
            sink.report_diagnostic(Diagnostic::new(
                diagnostic_id("GEN020"),
                DiagnosticSeverity::Info,
                format!("{count} side inputs"),
            ));
            sink.add_artifact(artifact("Extra.g.rs"), String::new())?;
            sink.add_artifact(artifact("Shared.g.rs"), String::new())
        })
        .register()
        .expect("pipeline should register");
    let mut host = MemoryHost::new(&registry.build());
    let cancel = CancellationToken::new();
    let claimed = compilation(vec![Declaration::new(
        "1",
        "record",
        "Shared",
        Location::new("a.decl", 1, 1),
    )]);

    let first = host.run(&compilation(Vec::new()), &cancel).expect("first pass");
    let second = host.run(&claimed, &cancel).expect("second pass");
    let third = host.run(&claimed, &cancel).expect("third pass");

    assert!(first.artifact("Extra.g.rs").is_some());
    assert_eq!(second.stats.outputs_replayed, 1);
    assert_eq!(second.failures.len(), 1);
    assert!(second.failures[0].message.contains("Shared.g.rs"));
    assert!(second.artifact("Extra.g.rs").is_none());
    assert_eq!(second.diagnostics_with_id(&diagnostic_id("GEN020")).count(), 0);
    assert_eq!(third.stats.outputs_replayed, 1);
    assert_eq!(runs.load(Ordering::SeqCst), 2);
    assert!(third.artifact("Extra.g.rs").is_none());
}

#[test]
fn run_sessions_on_separate_threads_same_unit_expected_identical_reports() {
    fn assert_send_sync<T: Send + Sync>(_: &T) {}

    let built = reporting(counter());
    assert_send_sync(&built);
    let input = compilation(vec![
        coded("1", "Color", "COL"),
        coded("2", "Shape", "shp"),
        coded("3", "Broken", "BRK"),
    ]);

    let reports: Vec<_> = std::thread::scope(|scope| {
        let workers: Vec<_> = (0..2)
            .map(|_| {
                scope.spawn(|| {
                    MemoryHost::new(&built)
                        .run(&input, &CancellationToken::new())
                        .expect("pass should complete")
                })
            })
            .collect();
        workers
            .into_iter()
            .map(|worker| worker.join().expect("worker should not panic"))
            .collect()
    });

    assert_ne!(reports[0].session_id, reports[1].session_id);
    assert_eq!(reports[0].artifacts, reports[1].artifacts);
    assert_eq!(reports[0].diagnostics, reports[1].diagnostics);
    assert_eq!(reports[0].artifacts.len(), 1);
}

#[test]
fn run_cancelled_token_expected_cancelled_error() {
    let mut host = MemoryHost::new(&propagating(counter()));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = host.run(&compilation(vec![coded("1", "Color", "COL")]), &cancel);

    assert!(matches!(result, Err(HostError::Cancelled)));
}

#[test]
fn run_cancelled_mid_pass_expected_cancelled_error() {
    let mut registry = PipelineRegistry::<MemoryInit>::new();
    registry
        .filter_pipeline::<String>()
        .filter(|_, cancel: &CancellationToken| {
            cancel.cancel();
            true
        })
        .transform(|ctx, _| ResultOrDiagnostic::success(ctx.node().name.clone()))
        .output(|_, _, _| Ok(()))
        .register()
        .expect("pipeline should register");
    let mut host = MemoryHost::new(&registry.build());

    let result = host.run(
        &compilation(vec![coded("1", "Color", "COL"), coded("2", "Shape", "SHP")]),
        &CancellationToken::new(),
    );

    assert!(matches!(result, Err(HostError::Cancelled)));
}

#[test]
fn session_report_expected_json_with_artifacts_and_stats() {
    let mut host = MemoryHost::new(&propagating(counter()));
    let report = host
        .run(&compilation(vec![coded("1", "Color", "COL")]), &CancellationToken::new())
        .expect("pass should complete");

    let json = serde_json::to_value(&report).expect("report should serialize");

    assert_eq!(json["pass"], 1);
    assert!(json["artifacts"]["Color.g.rs"].is_string());
    assert_eq!(json["stats"]["outputs_run"], 1);
}
