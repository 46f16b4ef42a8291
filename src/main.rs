use std::{process::ExitCode, time::Duration};

use bytes::Bytes;
use clap::ArgMatches;
use gcs_storage::{
    bootstrap::{self, BootstrapError},
    config::{self, Config, LogFormat},
    model::{
        error::StorageError,
        storage::{
            DeleteRequest, ExistsRequest, ListBlobsRequest, PreSignUrlRequest, PresignOperation,
            ReadRequest, WriteRequest,
        },
    },
    storage::Storage,
    util::object::{parse_object_uri, UriError},
};
use tokio::io::AsyncWriteExt;
use tracing::{error, info, span, Instrument, Level};
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Uri(#[from] UriError),
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
    #[error("{}: {}", .0.code(), .0.message())]
    Storage(#[from] StorageError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

async fn run(matches: &ArgMatches, config: &Config) -> Result<(), CliError> {
    let (name, sub) = match matches.subcommand() {
        Some(subcommand) => subcommand,
        None => return Ok(()),
    };

    let uri = sub
        .get_one::<String>("URI")
        .map(String::as_str)
        .unwrap_or_default();
    let uri = parse_object_uri(uri)?;
    info!(command=name, bucket=%uri.bucket, key=%uri.key, "args");

    let storage = bootstrap::plugin(config).await?;
    info!(project_id=?storage.project_id(), command=name, "dispatch");

    match name {
        "read" => {
            let res = storage
                .read(ReadRequest {
                    bucket_name: uri.bucket,
                    key: uri.key,
                })
                .await?;

            match sub.get_one::<String>("output") {
                Some(path) => tokio::fs::write(path, &res.body).await?,
                None => {
                    let mut stdout = tokio::io::stdout();
                    stdout.write_all(&res.body).await?;
                    stdout.flush().await?;
                }
            }
        }
        "write" => {
            let path = sub
                .get_one::<String>("FILE")
                .map(String::as_str)
                .unwrap_or_default();
            let body = tokio::fs::read(path).await?;

            storage
                .write(WriteRequest {
                    bucket_name: uri.bucket,
                    key: uri.key,
                    body: Bytes::from(body),
                })
                .await?;
        }
        "delete" => {
            storage
                .delete(DeleteRequest {
                    bucket_name: uri.bucket,
                    key: uri.key,
                })
                .await?;
        }
        "exists" => {
            let res = storage
                .exists(ExistsRequest {
                    bucket_name: uri.bucket,
                    key: uri.key,
                })
                .await?;
            println!("{}", res.exists);
        }
        "list" => {
            let res = storage
                .list_blobs(ListBlobsRequest {
                    bucket_name: uri.bucket,
                    prefix: uri.key,
                })
                .await?;
            for blob in res.blobs {
                println!("{}", blob.key);
            }
        }
        "presign" => {
            let operation = if sub.get_flag("write") {
                PresignOperation::Write
            } else {
                PresignOperation::Read
            };

            let res = storage
                .pre_sign_url(PreSignUrlRequest {
                    bucket_name: uri.bucket,
                    key: uri.key,
                    operation,
                    expiry: sub
                        .get_one::<u64>("expiry-secs")
                        .copied()
                        .map(Duration::from_secs),
                })
                .await?;
            println!("{}", res.url);
        }
        other => unreachable!("subcommand {} is not wired into run", other),
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let matches = config::command().get_matches();
    let config = Config::from_matches(&matches);
    init_tracing(config.log_format);

    let span = span!(Level::INFO, "main", context = "main");

    match run(&matches, &config).instrument(span).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error_message=%err, error_group="main");
            eprintln!("{}", err);
            ExitCode::FAILURE
        }
    }
}
