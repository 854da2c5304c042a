//! macOS host-automation actions and the builtin tool catalogue the
//! `deskpilot-tools` binary serves. Everything here shells out to system
//! commands; the registry interface is the only thing the rest of the
//! crate knows about.

use crate::application::registry::ToolRegistry;
use crate::domain::types::{ParamKind, ParameterSpec, ToolDescriptor, ToolInputSchema};
use serde_json::Value;
use std::io;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("missing required argument '{0}'")]
    MissingArgument(&'static str),
    #[error("argument '{name}' must be a {expected}")]
    InvalidArgument {
        name: &'static str,
        expected: &'static str,
    },
    #[error("command `{command}` failed: {stderr}")]
    CommandFailed { command: String, stderr: String },
    #[error("failed to run `{command}`: {source}")]
    Io {
        command: String,
        #[source]
        source: io::Error,
    },
}

async fn run_command(program: &str, args: &[&str]) -> Result<String, HostError> {
    debug!(program, ?args, "Running host command");
    let output = Command::new(program)
        .args(args)
        .output()
        .await
        .map_err(|source| HostError::Io {
            command: program.to_string(),
            source,
        })?;
    if !output.status.success() {
        return Err(HostError::CommandFailed {
            command: program.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

async fn osascript(script: &str) -> Result<(), HostError> {
    run_command("osascript", &["-e", script]).await?;
    Ok(())
}

pub async fn open_app(name: &str) -> Result<(), HostError> {
    run_command("open", &["-a", name]).await?;
    Ok(())
}

pub async fn close_app(name: &str) -> Result<(), HostError> {
    run_command("killall", &[name]).await?;
    Ok(())
}

pub async fn set_menu_bar_hidden(hide: bool) -> Result<(), HostError> {
    osascript(&format!(
        "tell application \"System Events\" to set autohide menu bar of dock preferences to {hide}"
    ))
    .await
}

pub async fn set_dock_hidden(hide: bool) -> Result<(), HostError> {
    osascript(&format!(
        "tell application \"System Events\" to set autohide of dock preferences to {hide}"
    ))
    .await
}

pub async fn move_dock(position: &str) -> Result<(), HostError> {
    if !matches!(position, "left" | "right" | "bottom") {
        return Err(HostError::InvalidArgument {
            name: "position",
            expected: "one of left, right, bottom",
        });
    }
    run_command(
        "defaults",
        &["write", "com.apple.dock", "orientation", position],
    )
    .await?;
    run_command("killall", &["Dock"]).await?;
    Ok(())
}

// Display modes used by `displayplacer`: 67 is the regular desktop
// resolution, 50 the lower one used while presenting.
const NORMAL_DISPLAY_MODE: u32 = 67;
const PRESENTER_DISPLAY_MODE: u32 = 50;

async fn set_presenter_resolution(presenter: bool) -> Result<(), HostError> {
    let listing = run_command("displayplacer", &["list"]).await?;
    let screen_id = listing
        .lines()
        .next()
        .and_then(|line| line.split(':').nth(1))
        .map(str::trim)
        .unwrap_or_default()
        .to_string();
    let mode = if presenter {
        PRESENTER_DISPLAY_MODE
    } else {
        NORMAL_DISPLAY_MODE
    };
    run_command("displayplacer", &[&format!("id:{screen_id} mode:{mode}")]).await?;
    Ok(())
}

async fn switch_to_desktop_2() -> Result<(), HostError> {
    osascript(
        "tell application \"System Events\"\n    key code 19 using {control down}\nend tell",
    )
    .await
}

pub async fn change_system_mode(mode: &str) -> Result<(), HostError> {
    if !matches!(mode, "presenter" | "normal") {
        return Err(HostError::InvalidArgument {
            name: "mode",
            expected: "'presenter' or 'normal'",
        });
    }
    let presenter = mode == "presenter";
    set_dock_hidden(presenter).await?;
    set_menu_bar_hidden(presenter).await?;
    set_presenter_resolution(presenter).await?;
    if presenter {
        switch_to_desktop_2().await?;
    }
    Ok(())
}

fn required_str(args: &Value, key: &'static str) -> Result<String, HostError> {
    match args.get(key) {
        Some(Value::String(value)) => Ok(value.clone()),
        Some(_) => Err(HostError::InvalidArgument {
            name: key,
            expected: "string",
        }),
        None => Err(HostError::MissingArgument(key)),
    }
}

fn required_bool(args: &Value, key: &'static str) -> Result<bool, HostError> {
    match args.get(key) {
        Some(Value::Bool(value)) => Ok(*value),
        Some(_) => Err(HostError::InvalidArgument {
            name: key,
            expected: "boolean",
        }),
        None => Err(HostError::MissingArgument(key)),
    }
}

fn descriptor(
    name: &str,
    description: &str,
    params: &[(&str, ParamKind, &str)],
    required: &[&str],
) -> ToolDescriptor {
    ToolDescriptor {
        name: name.to_string(),
        description: description.to_string(),
        input_schema: ToolInputSchema {
            properties: params
                .iter()
                .map(|(param, kind, title)| ParameterSpec {
                    name: param.to_string(),
                    kind: *kind,
                    title: title.to_string(),
                })
                .collect(),
            required: required.iter().map(|name| name.to_string()).collect(),
        },
    }
}

/// The catalogue served by `deskpilot-tools`.
pub fn builtin_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    registry.register(
        descriptor(
            "open_app",
            "Open an application on MacOS",
            &[("name", ParamKind::String, "Name")],
            &["name"],
        ),
        |args| async move {
            let name = required_str(&args, "name")?;
            open_app(&name).await?;
            Ok(format!("Opened {name}"))
        },
    );

    registry.register(
        descriptor(
            "close_app",
            "Close an application on MacOS",
            &[("name", ParamKind::String, "Name")],
            &["name"],
        ),
        |args| async move {
            let name = required_str(&args, "name")?;
            close_app(&name).await?;
            Ok(format!("Closed {name}"))
        },
    );

    registry.register(
        descriptor(
            "hide_top_menu_bar",
            "Hide or show the top menu bar on MacOS",
            &[("hide", ParamKind::Boolean, "Hide")],
            &["hide"],
        ),
        |args| async move {
            let hide = required_bool(&args, "hide")?;
            set_menu_bar_hidden(hide).await?;
            Ok(format!("Menu bar autohide set to {hide}"))
        },
    );

    registry.register(
        descriptor(
            "hide_dock",
            "Hide or show the dock on MacOS",
            &[("hide", ParamKind::Boolean, "Hide")],
            &["hide"],
        ),
        |args| async move {
            let hide = required_bool(&args, "hide")?;
            set_dock_hidden(hide).await?;
            Ok(format!("Dock autohide set to {hide}"))
        },
    );

    registry.register(
        descriptor(
            "move_dock",
            "Move the dock to left or right or bottom",
            &[("position", ParamKind::String, "Position")],
            &["position"],
        ),
        |args| async move {
            let position = required_str(&args, "position")?;
            move_dock(&position).await?;
            Ok(format!("Dock moved to {position}"))
        },
    );

    registry.register(
        descriptor(
            "change_system_mode",
            "Change system mode to presenter or normal",
            &[("mode", ParamKind::String, "Mode")],
            &["mode"],
        ),
        |args| async move {
            let mode = required_str(&args, "mode")?;
            change_system_mode(&mode).await?;
            Ok(format!("System mode changed to {mode}"))
        },
    );

    registry
}
