mod archive;
mod closure;
mod config;
mod error;
mod merge;
mod sb3;
mod scanner;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use config::MyBlocksConfig;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

const COMMON_HELP: &str = "Valid commands are:

    dump_json <project>
    copy_my_blocks <src_project> <dest_project>
";
const MISSING_COMMAND_HELP: &str = "You must provide a valid command. ";
const INVALID_COMMAND_HELP: &str = "You provided an invalid command. ";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Report merge decisions on stderr
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    /// Fail on a missing or unknown command instead of only printing help
    #[arg(long, global = true, default_value_t = false)]
    strict: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Commands {
    /// Print project.json followed by the custom blocks found in it
    #[command(name = "dump_json")]
    DumpJson {
        /// Project archive
        project: PathBuf,
    },
    /// Copy every custom block of one project into another
    #[command(name = "copy_my_blocks")]
    CopyMyBlocks {
        /// Project to copy custom blocks from
        src_project: PathBuf,
        /// Project to copy custom blocks into; the result is written next to it
        dest_project: PathBuf,
    },
    #[command(external_subcommand)]
    Unknown(Vec<OsString>),
}

/// What the command line asked for, independent of how clap spells it.
#[derive(Debug, PartialEq)]
enum Command {
    DumpJson {
        project: PathBuf,
    },
    CopyMyBlocks {
        src_project: PathBuf,
        dest_project: PathBuf,
    },
    Missing,
    Unknown(String),
}

#[derive(Debug)]
struct Invocation {
    config: Option<PathBuf>,
    verbose: bool,
    strict: bool,
    command: Command,
}

impl From<Cli> for Invocation {
    fn from(cli: Cli) -> Self {
        let command = match cli.command {
            Some(Commands::DumpJson { project }) => Command::DumpJson { project },
            Some(Commands::CopyMyBlocks {
                src_project,
                dest_project,
            }) => Command::CopyMyBlocks {
                src_project,
                dest_project,
            },
            Some(Commands::Unknown(args)) => Command::Unknown(
                args.first()
                    .map(|a| a.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            ),
            None => Command::Missing,
        };
        Self {
            config: cli.config,
            verbose: cli.verbose,
            strict: cli.strict,
            command,
        }
    }
}

fn parse_args<I, T>(argv: I) -> Result<Invocation, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    Ok(Cli::try_parse_from(argv)?.into())
}

fn main() -> Result<()> {
    let invocation = parse_args(std::env::args_os()).unwrap_or_else(|e| e.exit());

    let mut config = match &invocation.config {
        Some(path) => MyBlocksConfig::load(path)?,
        None => MyBlocksConfig::default(),
    };
    if invocation.strict {
        config.cli.strict_usage = true;
    }

    match invocation.command {
        Command::DumpJson { project } => {
            println!("{}", render_dump(&project, &config, invocation.verbose)?);
            Ok(())
        }
        Command::CopyMyBlocks {
            src_project,
            dest_project,
        } => copy_my_blocks(&src_project, &dest_project, &config, invocation.verbose).map(|_| ()),
        Command::Unknown(name) => usage(INVALID_COMMAND_HELP, &config)
            .with_context(|| format!("Unknown command '{}'", name)),
        Command::Missing => usage(MISSING_COMMAND_HELP, &config),
    }
}

fn usage(reason: &str, config: &MyBlocksConfig) -> Result<()> {
    println!("{}{}", reason, COMMON_HELP);
    if config.cli.strict_usage {
        return Err(anyhow::anyhow!("No valid command given"));
    }
    Ok(())
}

/// project.json, a line of 80 dashes, then the custom blocks as
/// `{ name: { block_id: block } }`.
fn render_dump(project: &Path, config: &MyBlocksConfig, verbose: bool) -> Result<String> {
    let document = archive::load_project_document(project)
        .with_context(|| format!("Failed to load project {}", format_path(project)))?;

    let my_blocks = document
        .my_blocks()
        .with_context(|| format!("Failed to extract custom blocks from {}", format_path(project)))?;
    if verbose {
        if my_blocks.is_empty() {
            eprintln!("{}", "No custom blocks found".yellow());
        } else {
            eprintln!(
                "{}",
                format!("Found {} custom blocks", my_blocks.len()).cyan()
            );
        }
    }

    Ok(format!(
        "{}\n{}\n{}",
        document.to_json(config.output.indent)?,
        "-".repeat(80),
        sb3::to_json_indented(&my_blocks, config.output.indent)?
    ))
}

fn copy_my_blocks(
    src_project: &Path,
    dest_project: &Path,
    config: &MyBlocksConfig,
    verbose: bool,
) -> Result<PathBuf> {
    let source = archive::load_project_document(src_project)
        .with_context(|| format!("Failed to load project {}", format_path(src_project)))?;
    let mut dest = archive::load_project_document(dest_project)
        .with_context(|| format!("Failed to load project {}", format_path(dest_project)))?;

    let report = dest.copy_my_blocks_from(&source).with_context(|| {
        format!(
            "Failed to copy custom blocks from {} into {}",
            format_path(src_project),
            format_path(dest_project)
        )
    })?;

    if verbose {
        for replaced in &report.replaced {
            eprintln!(
                "{}",
                format!(
                    "Replacing custom block {} ({} blocks removed, {} added)",
                    replaced.name, replaced.removed, replaced.inserted
                )
                .cyan()
            );
        }
        for name in &report.added {
            eprintln!("{}", format!("Adding custom block {}", name).cyan());
        }
    }

    let new_path = archive::save_project_document(dest_project, &dest, &config.output)
        .with_context(|| format!("Failed to write updated copy of {}", format_path(dest_project)))?;

    if verbose {
        eprintln!(
            "{}",
            format!("Wrote {}", format_path(&new_path)).green().bold()
        );
    }
    Ok(new_path)
}

pub fn format_path(path: &Path) -> String {
    path.to_string_lossy().replace("\\", "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::fs;
    use std::io::{Cursor, Write};
    use tempfile::TempDir;
    use zip::write::FileOptions;
    use zip::ZipWriter;

    fn zip_bytes(entries: Vec<(&str, Vec<u8>)>) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in entries {
            zip.start_file(name, FileOptions::default()).unwrap();
            zip.write_all(&content).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    fn write_project(path: &Path, blocks: Value) {
        let project = json!({
            "targets": [
                { "isStage": true, "name": "Stage", "blocks": {} },
                { "isStage": false, "name": "Sprite1", "blocks": blocks }
            ],
            "meta": { "semver": "3.0.0" }
        });
        let json = serde_json::to_vec(&project).unwrap();
        let inner = zip_bytes(vec![(archive::PROJECT_JSON_NAME, json)]);
        fs::write(path, zip_bytes(vec![(archive::INNER_ARCHIVE_NAME, inner)])).unwrap();
    }

    #[test]
    fn test_parse_copy_my_blocks() {
        let invocation = parse_args(["myblocks", "copy_my_blocks", "a.zip", "b.zip"]).unwrap();
        assert_eq!(
            invocation.command,
            Command::CopyMyBlocks {
                src_project: PathBuf::from("a.zip"),
                dest_project: PathBuf::from("b.zip"),
            }
        );
        assert!(!invocation.verbose);
        assert_eq!(invocation.config, None);
    }

    #[test]
    fn test_parse_dump_json_with_flags() {
        let invocation =
            parse_args(["myblocks", "--verbose", "dump_json", "game.zip", "--strict"]).unwrap();
        assert_eq!(
            invocation.command,
            Command::DumpJson {
                project: PathBuf::from("game.zip")
            }
        );
        assert!(invocation.verbose);
        assert!(invocation.strict);
    }

    #[test]
    fn test_parse_missing_and_unknown_commands() {
        let invocation = parse_args(["myblocks"]).unwrap();
        assert_eq!(invocation.command, Command::Missing);

        let invocation = parse_args(["myblocks", "copymyblocks", "a", "b"]).unwrap();
        assert_eq!(
            invocation.command,
            Command::Unknown("copymyblocks".to_string())
        );
    }

    #[test]
    fn test_parse_wrong_argument_count_is_error() {
        assert!(parse_args(["myblocks", "copy_my_blocks", "only-one.zip"]).is_err());
        assert!(parse_args(["myblocks", "dump_json"]).is_err());
    }

    #[test]
    fn test_usage_strictness() {
        let mut config = MyBlocksConfig::default();
        assert!(usage(MISSING_COMMAND_HELP, &config).is_ok());
        config.cli.strict_usage = true;
        assert!(usage(INVALID_COMMAND_HELP, &config).is_err());
    }

    #[test]
    fn test_dump_json_output_layout() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("game.zip");
        write_project(
            &path,
            json!({
                "d1": { "opcode": "procedures_definition", "next": "s1",
                        "inputs": { "custom_block": [1, "p1"] } },
                "p1": { "opcode": "procedures_prototype", "parent": "d1",
                        "mutation": { "proccode": "jump %s" } },
                "s1": { "opcode": "motion_changeyby", "parent": "d1" },
                "h1": { "opcode": "event_whenflagclicked", "topLevel": true }
            }),
        );

        let out = render_dump(&path, &MyBlocksConfig::default(), false).unwrap();

        let separator = "-".repeat(80);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.iter().filter(|l| **l == separator).count(), 1);
        let (document, closures) = out.split_once(&format!("\n{}\n", separator)).unwrap();

        let document: Value = serde_json::from_str(document).unwrap();
        assert_eq!(document["targets"][1]["name"], "Sprite1");
        assert_eq!(document["meta"]["semver"], "3.0.0");

        let closures: Value = serde_json::from_str(closures).unwrap();
        let closures = closures.as_object().unwrap();
        assert_eq!(closures.keys().collect::<Vec<_>>(), vec!["jump"]);
        let mut ids: Vec<&String> = closures["jump"].as_object().unwrap().keys().collect();
        ids.sort();
        assert_eq!(ids, vec!["d1", "p1", "s1"]);
    }

    #[test]
    fn test_copy_my_blocks_end_to_end() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src.zip");
        let dest = dir.path().join("dest.zip");
        write_project(
            &src,
            json!({
                "sd": { "opcode": "procedures_definition", "next": "ss",
                        "inputs": { "custom_block": [1, "sp"] } },
                "sp": { "opcode": "procedures_prototype", "parent": "sd",
                        "mutation": { "proccode": "foo %s" } },
                "ss": { "opcode": "looks_show", "parent": "sd" }
            }),
        );
        write_project(
            &dest,
            json!({
                "dd": { "opcode": "procedures_definition",
                        "inputs": { "custom_block": [1, "dp"] } },
                "dp": { "opcode": "procedures_prototype", "parent": "dd",
                        "mutation": { "proccode": "foo" } },
                "keep": { "opcode": "event_whenflagclicked", "topLevel": true }
            }),
        );
        let dest_before = fs::read(&dest).unwrap();

        let new_path = copy_my_blocks(&src, &dest, &MyBlocksConfig::default(), false).unwrap();

        assert_eq!(new_path, dir.path().join("new_dest.zip"));
        assert_eq!(fs::read(&dest).unwrap(), dest_before);
        let merged = archive::load_project_document(&new_path).unwrap();
        let keys: Vec<&String> = merged.blocks().unwrap().keys().collect();
        assert_eq!(keys, vec!["keep", "sd", "sp", "ss"]);
    }

    #[test]
    fn test_copy_from_project_without_sprite_fails() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("stage-only.zip");
        let project = json!({ "targets": [{ "isStage": true, "blocks": {} }] });
        let inner = zip_bytes(vec![(
            archive::PROJECT_JSON_NAME,
            serde_json::to_vec(&project).unwrap(),
        )]);
        fs::write(&src, zip_bytes(vec![(archive::INNER_ARCHIVE_NAME, inner)])).unwrap();
        let dest = dir.path().join("dest.zip");
        write_project(&dest, json!({}));

        let err = copy_my_blocks(&src, &dest, &MyBlocksConfig::default(), false).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<error::BlocksError>(),
            Some(error::BlocksError::NoTarget)
        ));
        assert!(!dir.path().join("new_dest.zip").exists());
    }
}
