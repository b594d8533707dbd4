use anyhow::{bail, Context, Result};
use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;

// D-Bus proxy. `#[zbus::proxy]` generates `AttendanceProxy` (async) and
// `AttendanceProxyBlocking`. Only the async variant is used here.
#[zbus::proxy(
    interface = "org.rollcall.Attendance1",
    default_service = "org.rollcall.Attendance1",
    default_path = "/org/rollcall/Attendance1"
)]
trait Attendance {
    async fn clock_in(&self) -> zbus::Result<String>;
    async fn enroll(&self, name: &str, replace: bool) -> zbus::Result<String>;
    async fn enroll_from_file(&self, name: &str, path: &str, replace: bool) -> zbus::Result<String>;
    async fn recent_history(&self, limit: u32) -> zbus::Result<String>;
    async fn annotated_frame(&self) -> zbus::Result<Vec<u8>>;
    async fn reload(&self) -> zbus::Result<String>;
    async fn status(&self) -> zbus::Result<String>;
}

#[derive(Parser)]
#[command(name = "rollcall", about = "Rollcall face recognition attendance CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record attendance for the person in front of the camera
    ClockIn,
    /// Enroll a new identity from the camera or an image file
    Enroll {
        /// Display name for the identity
        #[arg(short, long)]
        name: String,
        /// Enroll this image instead of the current camera frame
        #[arg(short, long)]
        image: Option<PathBuf>,
        /// Replace an existing identity with the same name
        #[arg(long)]
        replace: bool,
    },
    /// Show recent attendance, newest first
    History {
        #[arg(short, long, default_value_t = 25)]
        limit: u32,
    },
    /// Save the current annotated frame as PNG
    Snapshot {
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Reload enrolled identities from disk
    Reload,
    /// Show daemon status
    Status,
    /// List local video capture devices (does not need the daemon)
    Devices,
}

/// One attendance record as returned by `RecentHistory`.
#[derive(Debug, Deserialize)]
struct HistoryRecord {
    name: String,
    timestamp: NaiveDateTime,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::ClockIn => {
            let body = accepted(&connect().await?.clock_in().await?)?;
            println!("Clocked in: {}", str_field(&body, "name"));
        }
        Commands::Enroll { name, image, replace } => {
            let proxy = connect().await?;
            let reply = match image {
                Some(path) => {
                    // The daemon resolves paths relative to its own working directory.
                    let path = std::fs::canonicalize(&path)
                        .with_context(|| format!("cannot access {}", path.display()))?;
                    proxy
                        .enroll_from_file(&name, &path.to_string_lossy(), replace)
                        .await?
                }
                None => proxy.enroll(&name, replace).await?,
            };
            let body = accepted(&reply)?;
            println!(
                "Enrolled {} ({} identities registered)",
                str_field(&body, "name"),
                body["registered"]
            );
        }
        Commands::History { limit } => {
            let records: Vec<HistoryRecord> =
                serde_json::from_str(&connect().await?.recent_history(limit).await?).context("malformed history reply")?;
            if records.is_empty() {
                println!("No attendance recorded");
            }
            for record in &records {
                println!("{}", format_record(record));
            }
        }
        Commands::Snapshot { output } => {
            let png = connect().await?.annotated_frame().await?;
            std::fs::write(&output, &png).with_context(|| format!("failed to write {}", output.display()))?;
            println!("Saved {} ({} bytes)", output.display(), png.len());
        }
        Commands::Reload => {
            let body = accepted(&connect().await?.reload().await?)?;
            println!("{} identities registered", body["registered"]);
            print_list("Skipped", &body["skipped"]);
            print_list("Duplicate", &body["duplicates"]);
        }
        Commands::Status => {
            let status: Value = serde_json::from_str(&connect().await?.status().await?)?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Commands::Devices => {
            let devices = rollcall_hw::Camera::list_devices();
            if devices.is_empty() {
                println!("No video capture devices found");
            }
            for dev in devices {
                println!("{}  {} ({}, {})", dev.path, dev.name, dev.driver, dev.bus);
            }
        }
    }

    Ok(())
}

async fn connect() -> Result<AttendanceProxy<'static>> {
    let conn = zbus::Connection::session()
        .await
        .context("failed to connect to the session bus")?;
    AttendanceProxy::new(&conn)
        .await
        .context("rollcalld is not reachable")
}

/// Parse an action reply, turning `"ok": false` into an error carrying the
/// daemon's message.
fn accepted(reply: &str) -> Result<Value> {
    let body: Value = serde_json::from_str(reply).context("malformed reply from rollcalld")?;
    if body["ok"] != Value::Bool(true) {
        bail!(
            "{} ({})",
            body["message"].as_str().unwrap_or("request rejected"),
            body["reason"].as_str().unwrap_or("unknown")
        );
    }
    Ok(body)
}

fn str_field<'a>(body: &'a Value, key: &str) -> &'a str {
    body[key].as_str().unwrap_or_default()
}

fn print_list(label: &str, values: &Value) {
    for v in values.as_array().into_iter().flatten() {
        println!("{label}: {}", v.as_str().unwrap_or_default());
    }
}

/// `Alice  Oct 16 at 09:30 AM`
fn format_record(record: &HistoryRecord) -> String {
    format!("{}  {}", record.name, record.timestamp.format("%b %d at %I:%M %p"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_record() {
        let record: HistoryRecord =
            serde_json::from_str(r#"{"name":"Alice","timestamp":"2026-10-16T09:30:12.500000"}"#).unwrap();
        assert_eq!(format_record(&record), "Alice  Oct 16 at 09:30 AM");

        let record: HistoryRecord =
            serde_json::from_str(r#"{"name":"Bob","timestamp":"2026-03-02T17:05:00"}"#).unwrap();
        assert_eq!(format_record(&record), "Bob  Mar 02 at 05:05 PM");
    }

    #[test]
    fn test_accepted() {
        let body = accepted(r#"{"ok":true,"name":"Alice"}"#).unwrap();
        assert_eq!(str_field(&body, "name"), "Alice");

        let err = accepted(r#"{"ok":false,"reason":"not_recognized","message":"no match"}"#).unwrap_err();
        assert_eq!(err.to_string(), "no match (not_recognized)");

        assert!(accepted("not json").is_err());
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from(["rollcall", "enroll", "--name", "Alice", "--replace"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Enroll { ref name, image: None, replace: true } if name == "Alice"
        ));
        let cli = Cli::try_parse_from(["rollcall", "history"]).unwrap();
        assert!(matches!(cli.command, Commands::History { limit: 25 }));
    }
}
