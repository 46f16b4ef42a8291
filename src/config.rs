use std::time::Duration;

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Json,
    Text,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Config {
    /// Overrides the project discovered from the credentials.
    pub project_id: Option<String>,
    /// Per-call bound; zero or unset means none.
    pub deadline: Option<Duration>,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_matches(matches: &ArgMatches) -> Self {
        let log_format = match matches.get_one::<String>("log-format").map(String::as_str) {
            Some("text") => LogFormat::Text,
            _ => LogFormat::Json,
        };

        Self {
            project_id: matches.get_one::<String>("project").cloned(),
            deadline: matches
                .get_one::<u64>("deadline-secs")
                .copied()
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            log_format,
        }
    }
}

fn uri_arg() -> Arg {
    Arg::new("URI")
        .required(true)
        .index(1)
        .help("gs://bucket/key")
}

pub fn command() -> Command {
    Command::new("gcs-storage")
        .version(clap::crate_version!())
        .about("Object storage operations against Google Cloud Storage")
        .subcommand_required(true)
        .arg(
            Arg::new("project")
                .long("project")
                .env("GCS_STORAGE_PROJECT")
                .global(true),
        )
        .arg(
            Arg::new("deadline-secs")
                .long("deadline-secs")
                .env("GCS_STORAGE_DEADLINE_SECS")
                .value_parser(value_parser!(u64))
                .global(true),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .env("GCS_STORAGE_LOG_FORMAT")
                .value_parser(["json", "text"])
                .default_value("json")
                .global(true),
        )
        .subcommand(
            Command::new("read").arg(uri_arg()).arg(
                Arg::new("output")
                    .long("output")
                    .short('o')
                    .help("write the body here instead of stdout"),
            ),
        )
        .subcommand(
            Command::new("write")
                .arg(uri_arg())
                .arg(Arg::new("FILE").required(true).index(2)),
        )
        .subcommand(Command::new("delete").arg(uri_arg()))
        .subcommand(Command::new("exists").arg(uri_arg()))
        .subcommand(Command::new("list").arg(uri_arg().help("gs://bucket/prefix")))
        .subcommand(
            Command::new("presign")
                .arg(uri_arg())
                .arg(
                    Arg::new("write")
                        .long("write")
                        .action(ArgAction::SetTrue)
                        .help("sign for upload instead of download"),
                )
                .arg(
                    Arg::new("expiry-secs")
                        .long("expiry-secs")
                        .value_parser(value_parser!(u64)),
                ),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_matches() {
        let cases = vec![
            (
                vec!["gcs-storage", "exists", "gs://b/k"],
                Config::default(),
            ),
            (
                vec![
                    "gcs-storage",
                    "--project",
                    "proj",
                    "--deadline-secs",
                    "30",
                    "--log-format",
                    "text",
                    "read",
                    "gs://b/k",
                ],
                Config {
                    project_id: Some("proj".to_string()),
                    deadline: Some(Duration::from_secs(30)),
                    log_format: LogFormat::Text,
                },
            ),
            (
                vec!["gcs-storage", "list", "gs://b/", "--deadline-secs", "0"],
                Config::default(),
            ),
        ];

        for (args, expected) in cases {
            let matches = command().try_get_matches_from(args.clone()).unwrap();
            assert_eq!(
                Config::from_matches(&matches),
                expected,
                "failed for case: {:?}",
                args
            );
        }
    }

    #[test]
    fn test_command_rejects_bad_input() {
        assert!(command().try_get_matches_from(["gcs-storage"]).is_err());
        assert!(command()
            .try_get_matches_from(["gcs-storage", "--log-format", "xml", "exists", "gs://b/k"])
            .is_err());
        assert!(command()
            .try_get_matches_from(["gcs-storage", "write", "gs://b/k"])
            .is_err());
        assert!(command()
            .try_get_matches_from(["gcs-storage", "copy", "gs://b/k"])
            .is_err());
    }

    #[test]
    fn test_subcommands() {
        let names: Vec<String> = command()
            .get_subcommands()
            .map(|sub| sub.get_name().to_string())
            .collect();

        assert_eq!(
            names,
            vec!["read", "write", "delete", "exists", "list", "presign"],
            "failed for case: subcommand set"
        );
    }
}
