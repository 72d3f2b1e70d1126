//! The sample generator installed by `pipegen`.
//!
//! - a post-initialization marker artifact, `GeneratedMarker.g.rs`;
//! - `codes`: every declaration carrying a `code` attribute must use an
//!   uppercase value (`GEN001` otherwise) and yields `<Name>.g.rs`;
//! - `manifest`: the side inputs summarised into `Manifest.g.rs`, skipped with
//!   an informational `GEN002` when there are none.
//!
//! Output failures are reported as `GEN999` diagnostics.

use anyhow::{Context, Result};
use memory_host::{Compilation, Declaration, DeclarationContext, MemoryInit, SideInput};
use pipeline::{
    ArtifactName, BuiltPipelines, CancellationToken, Diagnostic, DiagnosticDescriptor,
    DiagnosticId, DiagnosticSeverity, EquatableSequence, Location, OutputError, PipelineName,
    PipelineRegistry, ProductionContext, ResultOrDiagnostic, SyntaxContext,
};

pub const MARKER_ARTIFACT: &str = "GeneratedMarker.g.rs";
pub const MANIFEST_ARTIFACT: &str = "Manifest.g.rs";

const CODE_ATTRIBUTE: &str = "code";

#[derive(Debug, Clone, PartialEq)]
struct CodeModel {
    name: String,
    code: String,
    location: Location,
}

#[derive(Debug, Clone, PartialEq)]
struct Manifest {
    assembly: String,
    entries: EquatableSequence<(String, usize)>,
}

fn id(value: &str) -> Result<DiagnosticId> {
    DiagnosticId::new(value).with_context(|| format!("invalid diagnostic id '{value}'"))
}

fn name(value: &str) -> Result<PipelineName> {
    PipelineName::new(value).with_context(|| format!("invalid pipeline name '{value}'"))
}

fn artifact(value: String) -> Result<ArtifactName, OutputError> {
    ArtifactName::new(value).ok_or_else(|| OutputError::message("artifact name is empty"))
}

/// Declares and freezes the sample pipelines.
pub fn sample_generator() -> Result<BuiltPipelines<MemoryInit>> {
    let lowercase = id("GEN001")?;
    let no_inputs = id("GEN002")?;

    let mut registry = PipelineRegistry::with_default_diagnostic(
        DiagnosticDescriptor::output_failure(id("GEN999")?, "Generation failed"),
    );

    registry.add_post_initialization(|sink, _| {
        sink.add_artifact(
            artifact(MARKER_ARTIFACT.to_string())?,
            "/// Marks an assembly processed by pipegen.\npub struct GeneratedMarker;\n".to_string(),
        )
    });

    registry
        .filter_pipeline::<CodeModel>()
        .named(name("codes")?)
        .filter(|node: &Declaration, _| node.attribute(CODE_ATTRIBUTE).is_some())
        .transform(move |ctx: &DeclarationContext, _| validate_code(ctx, &lowercase))
        .output(write_code)
        .register()?;

    registry
        .single_value_pipeline(|init: &mut MemoryInit| init.compilation())
        .named(name("manifest")?)
        .transform(move |compilation: &Compilation, _| {
            summarise(&compilation.assembly_name, &compilation.side_inputs, &no_inputs)
        })
        .output(write_manifest)
        .register()?;

    Ok(registry.build())
}

fn validate_code(ctx: &DeclarationContext, lowercase: &DiagnosticId) -> ResultOrDiagnostic<CodeModel> {
    let node = ctx.node();
    let code = node.attribute(CODE_ATTRIBUTE).unwrap_or_default();
    if code.chars().any(char::is_lowercase) {
        return ResultOrDiagnostic::fail(
            Diagnostic::new(
                lowercase.clone(),
                DiagnosticSeverity::Error,
                format!("code '{code}' of '{}' must be uppercase", node.name),
            )
            .with_category("Validation")
            .with_location(node.location.clone()),
        );
    }
    ResultOrDiagnostic::success(CodeModel {
        name: node.name.clone(),
        code: code.to_string(),
        location: node.location.clone(),
    })
}

fn write_code(
    sink: &mut dyn ProductionContext,
    model: &CodeModel,
    cancel: &CancellationToken,
) -> Result<(), OutputError> {
    if cancel.is_cancelled() {
        return Err(OutputError::Cancelled);
    }
    let content = format!(
        "// Generated from {}.\npub const {}_CODE: &str = \"{}\";\n",
        model.location,
        model.name.to_uppercase(),
        model.code
    );
    sink.add_artifact(artifact(format!("{}.g.rs", model.name))?, content)
}

fn summarise(
    assembly: &str,
    side_inputs: &EquatableSequence<SideInput>,
    no_inputs: &DiagnosticId,
) -> ResultOrDiagnostic<Manifest> {
    if side_inputs.is_empty() {
        return ResultOrDiagnostic::fail(Diagnostic::new(
            no_inputs.clone(),
            DiagnosticSeverity::Info,
            format!("'{assembly}' has no side inputs; manifest skipped"),
        ));
    }
    ResultOrDiagnostic::success(Manifest {
        assembly: assembly.to_string(),
        entries: side_inputs
            .iter()
            .map(|input| (input.path.clone(), input.text.lines().count()))
            .collect(),
    })
}

fn write_manifest(
    sink: &mut dyn ProductionContext,
    manifest: &Manifest,
    _: &CancellationToken,
) -> Result<(), OutputError> {
    let mut content = format!(
        "pub const ASSEMBLY: &str = \"{}\";\npub const SIDE_INPUTS: &[(&str, usize)] = &[\n",
        manifest.assembly
    );
    for (path, lines) in manifest.entries.iter() {
        content.push_str(&format!("    (\"{path}\", {lines}),\n"));
    }
    content.push_str("];\n");
    sink.add_artifact(artifact(MANIFEST_ARTIFACT.to_string())?, content)
}
