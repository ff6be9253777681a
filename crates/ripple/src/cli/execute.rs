//! Command execution logic.
//!
//! This module contains the implementation of all CLI commands. Mutating
//! commands save the snapshot before returning.

use anyhow::{Context, Result};
use serde_json::Value;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::args::{
    AddArgs, DeleteArgs, DepAction, DepArgs, ImpactArgs, InfoArgs, InitArgs, ListArgs,
    PropagateArgs, ReplayArgs, ShowArgs, UpdateArgs,
};
use crate::domain::{ComponentFilter, ComponentUpdate, Metadata, NewComponent, NewDependency};
use crate::engine::Engine;
use crate::events::RecordingSink;
use crate::impact::ImpactRequest;
use crate::inbound::InboundEvent;
use crate::output::{self, OutputMode};
use crate::propagation::ChangeDetails;

fn into_metadata(entries: &[(String, Value)]) -> Metadata {
    entries.iter().cloned().collect()
}

/// Execute the init command
pub async fn execute_init(args: &InitArgs, output_mode: OutputMode) -> Result<()> {
    use crate::commands::init;

    let current_dir = std::env::current_dir()?;
    let result = init::init(&current_dir).await?;

    match output_mode {
        OutputMode::Json => output::print_json(&serde_json::json!({
            "ripple_dir": result.ripple_dir.display().to_string(),
            "config_file": result.config_file.display().to_string(),
            "snapshot_file": result.snapshot_file.display().to_string(),
        }))?,
        OutputMode::Text if !args.quiet => {
            println!("Initialized ripple in {}", result.ripple_dir.display());
            println!("  Config:   {}", result.config_file.display());
            println!("  Snapshot: {}", result.snapshot_file.display());
        }
        OutputMode::Text => {}
    }

    Ok(())
}

/// Execute the info command
pub async fn execute_info(engine: &Engine, _args: &InfoArgs, output_mode: OutputMode) -> Result<()> {
    let stats = engine.stats().await?;
    let snapshot = engine
        .ripple_dir()
        .map(|dir| dir.join(&engine.config().snapshot_file).display().to_string())
        .unwrap_or_default();

    match output_mode {
        OutputMode::Json => output::print_json(&serde_json::json!({
            "snapshot_path": snapshot,
            "components": stats.components,
            "dependencies": stats.dependencies,
        }))?,
        OutputMode::Text => {
            println!("Ripple Workspace Information");
            println!("============================");
            println!();
            println!("Snapshot:     {snapshot}");
            println!("Components:   {}", stats.components);
            println!("Dependencies: {}", stats.dependencies);
        }
    }

    Ok(())
}

/// Execute the add command
pub async fn execute_add(engine: &Engine, args: &AddArgs, output_mode: OutputMode) -> Result<()> {
    let mut new = NewComponent::new(
        args.id.clone(),
        args.name.clone().unwrap_or_else(|| args.id.to_string()),
        args.component_type.into(),
        args.version.clone(),
        args.project.clone(),
    );
    new.metadata = into_metadata(&args.metadata);

    let component = engine.registry().create_component(new).await?;
    engine.save().await?;

    output::print_component(&component, output_mode)?;
    Ok(())
}

/// Execute the update command
pub async fn execute_update(
    engine: &Engine,
    args: &UpdateArgs,
    output_mode: OutputMode,
) -> Result<()> {
    let mut metadata = into_metadata(&args.metadata);
    if args.breaking {
        metadata.insert(crate::domain::BREAKING_CHANGE_KEY.to_string(), Value::Bool(true));
    }

    let update = ComponentUpdate {
        version: args.version.clone(),
        status: args.status.map(Into::into),
        metadata: (!metadata.is_empty()).then_some(metadata),
    };

    let outcome = engine
        .registry()
        .update_component(&args.id, update, args.by.as_deref())
        .await;
    // The update commits before propagation runs, so persist either way.
    engine.save().await?;
    let outcome = outcome?;

    output::print_update(&outcome, output_mode)?;
    Ok(())
}

/// Execute the delete command
pub async fn execute_delete(
    engine: &Engine,
    args: &DeleteArgs,
    output_mode: OutputMode,
) -> Result<()> {
    let component = engine.registry().delete_component(&args.id).await?;
    engine.save().await?;

    output::print_message(&format!("Deleted {}", component.id), output_mode)?;
    Ok(())
}

/// Execute the show command
pub async fn execute_show(engine: &Engine, args: &ShowArgs, output_mode: OutputMode) -> Result<()> {
    let details = engine.component_details(&args.id).await?;
    output::print_component_details(&details, output_mode)?;
    Ok(())
}

/// Execute the list command
pub async fn execute_list(engine: &Engine, args: &ListArgs, output_mode: OutputMode) -> Result<()> {
    let filter = ComponentFilter {
        project_id: args.project.clone(),
        component_type: args.component_type.map(Into::into),
        ..ComponentFilter::default()
    };

    let mut components = engine.registry().list(&filter).await?;
    components.truncate(args.limit);

    output::print_components(&components, output_mode)?;
    Ok(())
}

/// Execute the dep command
pub async fn execute_dep(engine: &Engine, args: &DepArgs, output_mode: OutputMode) -> Result<()> {
    let deps = engine.dependencies();

    match &args.action {
        DepAction::Add {
            source,
            target,
            dep_type,
            strength,
        } => {
            let dependency = deps
                .add(
                    NewDependency::new(source.clone(), target.clone(), (*dep_type).into())
                        .with_strength((*strength).into()),
                )
                .await?;
            engine.save().await?;
            match output_mode {
                OutputMode::Json => output::print_json(&dependency)?,
                OutputMode::Text => println!("Added dependency {dependency}"),
            }
        }
        DepAction::Remove {
            source,
            target,
            dep_type,
        } => {
            let dependency = deps
                .remove_dependency(source, target, (*dep_type).into())
                .await?;
            engine.save().await?;
            match output_mode {
                OutputMode::Json => output::print_json(&dependency)?,
                OutputMode::Text => println!("Removed dependency {dependency}"),
            }
        }
        DepAction::List {
            id,
            dependents,
            transitive,
        } => match (*dependents, *transitive) {
            (false, false) => {
                output::print_dependencies(&deps.direct_dependencies(id).await?, output_mode)?;
            }
            (true, false) => {
                output::print_dependencies(&deps.direct_dependents(id).await?, output_mode)?;
            }
            (false, true) => {
                output::print_components(&engine.transitive_dependencies(id).await?, output_mode)?;
            }
            (true, true) => {
                output::print_components(&engine.transitive_dependents(id).await?, output_mode)?;
            }
        },
        DepAction::Path { source, target } => {
            let path = engine.dependency_path(source, target).await?;
            output::print_path(path.as_ref(), output_mode)?;
        }
    }

    Ok(())
}

/// Execute the impact command
pub async fn execute_impact(
    engine: &Engine,
    args: &ImpactArgs,
    output_mode: OutputMode,
) -> Result<()> {
    let request = ImpactRequest::new(
        args.project.clone(),
        args.description.clone(),
        args.targets.clone(),
    )
    .with_change_type(args.change_type.into())
    .with_depth(args.depth.into());

    let analysis = engine.analyze(&request).await?;
    output::print_analysis(&analysis, output_mode)?;
    Ok(())
}

/// Execute the propagate command
pub async fn execute_propagate(
    engine: &Engine,
    args: &PropagateArgs,
    output_mode: OutputMode,
) -> Result<()> {
    let mut change = if args.rollback {
        ChangeDetails::rollback()
    } else if args.breaking {
        ChangeDetails::breaking()
    } else {
        ChangeDetails::default()
    };
    if let Some(strength) = args.min_strength {
        change = change.with_min_strength(strength.into());
    }
    if let Some(by) = &args.by {
        change = change.initiated_by(by.clone());
    }

    let outcome = engine.propagate(&args.id, change).await?;
    output::print_propagation(&outcome, output_mode)?;
    Ok(())
}

/// Execute the replay command
///
/// Lines are applied in order. Blank lines are skipped. Without
/// `--keep-going` the first failing event stops the replay; everything
/// applied before it is kept and saved. Outbound events published while
/// applying a line are printed after it.
pub async fn execute_replay(
    engine: &Engine,
    sink: &RecordingSink,
    args: &ReplayArgs,
    output_mode: OutputMode,
) -> Result<()> {
    let file = File::open(&args.file)
        .await
        .with_context(|| format!("Failed to open {}", args.file.display()))?;
    let mut lines = BufReader::new(file).lines();

    let mut line_number = 0;
    let mut failures = 0;
    let mut first_error = None;

    while let Some(line) = lines.next_line().await? {
        line_number += 1;
        if line.trim().is_empty() {
            continue;
        }

        let result = match serde_json::from_str::<InboundEvent>(&line) {
            Ok(event) => engine.processor().process(event).await.map_err(anyhow::Error::from),
            Err(e) => Err(anyhow::Error::from(e).context("Malformed inbound event")),
        };

        let published = sink.take().await;
        match result {
            Ok(outcome) => {
                output::print_inbound(line_number, &outcome, output_mode)?;
                output::print_outbound(&published, output_mode)?;
            }
            Err(e) => {
                failures += 1;
                tracing::warn!(line = line_number, error = %e, "Inbound event failed");
                if !args.keep_going {
                    first_error = Some(e.context(format!("line {line_number}")));
                    break;
                }
                eprintln!("line {line_number}: {e:#}");
            }
        }
    }

    engine.save().await?;

    if let Some(e) = first_error {
        return Err(e);
    }
    if failures > 0 {
        anyhow::bail!("{failures} event(s) failed");
    }
    Ok(())
}
