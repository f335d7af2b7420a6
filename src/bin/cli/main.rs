use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use object_browser::{
    adapters::outbound::export::HttpExportClient,
    domain::models::{ExportRequest, Record},
    services::ExportPipeline,
};
use reqwest::{multipart, Client, StatusCode};
use serde_json::{json, Value};
use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

#[derive(Parser, Debug)]
#[command(name = "object-browser-cli")]
#[command(about = "CLI for the object browser server", long_about = None)]
struct Cli {
    /// Server URL
    #[arg(short, long, env = "OBJECT_BROWSER_URL", default_value = "http://localhost:3000")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List configured buckets
    Buckets,

    /// List one folder of a bucket
    List {
        /// Bucket id
        bucket: String,
        /// Folder path, bucket root when omitted
        #[arg(short, long)]
        folder: Option<String>,
        /// Case-insensitive name filter
        #[arg(short, long)]
        search: Option<String>,
        /// Type family filter
        #[arg(short = 't', long = "type")]
        type_family: Option<String>,
        /// name | size | date
        #[arg(long, default_value = "name")]
        sort: String,
        /// asc | desc
        #[arg(long, default_value = "asc")]
        order: String,
        #[arg(long, default_value = "1")]
        page: usize,
        #[arg(long, default_value = "50")]
        per_page: usize,
    },

    /// Upload files into a bucket folder
    Upload {
        /// Bucket id
        bucket: String,
        /// Files to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Target folder, bucket root when omitted
        #[arg(short, long)]
        folder: Option<String>,
        /// Wait until every upload has finished
        #[arg(short, long)]
        wait: bool,
    },

    /// Delete objects by id
    Delete {
        /// Bucket id
        bucket: String,
        /// Object ids
        #[arg(required = true)]
        ids: Vec<String>,
        /// Folder the objects are listed in
        #[arg(short, long)]
        folder: Option<String>,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Export a JSON records file into a report artifact
    Export {
        /// Subject the records belong to
        #[arg(long)]
        subject: String,
        /// Section key (full_report, variants_only, risk_summary)
        #[arg(long, default_value = "full_report")]
        section: String,
        /// Format key (json, csv, tsv, vcf, pdf-text, spreadsheet)
        #[arg(long, default_value = "json")]
        format: String,
        /// JSON file holding an array of records
        #[arg(long)]
        records: PathBuf,
        /// Directory the artifact is written to
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
        /// Date stamped into the filename (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Remote export service base URL
        #[arg(long, env = "EXPORT_REMOTE_URL")]
        remote_url: Option<String>,
        /// Render locally without trying the remote service
        #[arg(long)]
        offline: bool,
        /// Remote export timeout in seconds
        #[arg(long, default_value = "30")]
        timeout_secs: u64,
    },
}

struct ApiClient {
    http: Client,
    base_url: String,
}

impl ApiClient {
    fn new(base_url: &str) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let response = self
            .http
            .get(self.url(path))
            .query(query)
            .send()
            .await
            .with_context(|| format!("GET {} failed", path))?;
        read_json(response).await
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<(StatusCode, Value)> {
        let response = self
            .http
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .with_context(|| format!("POST {} failed", path))?;
        let status = response.status();
        let body = response.json().await.context("Invalid JSON response")?;
        Ok((status, body))
    }
}

async fn read_json(response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    let body: Value = response.json().await.context("Invalid JSON response")?;
    if !status.is_success() {
        anyhow::bail!("{}: {}", status, error_message(&body));
    }
    Ok(body)
}

fn error_message(body: &Value) -> String {
    body["message"]
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string())
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

async fn upload(
    client: &ApiClient,
    bucket: &str,
    files: &[PathBuf],
    folder: Option<String>,
    wait: bool,
) -> Result<()> {
    let mut form = multipart::Form::new();
    for path in files {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("{} has no usable file name", path.display()))?
            .to_string();
        form = form.part("file", multipart::Part::bytes(data).file_name(name));
    }

    let mut request = client
        .http
        .post(client.url(&format!("/buckets/{}/uploads", bucket)))
        .multipart(form);
    if let Some(folder) = folder {
        request = request.query(&[("folder", folder)]);
    }

    let response = request.send().await.context("Upload request failed")?;
    let submitted = read_json(response).await?;
    if !wait {
        return print_json(&submitted);
    }

    let ids: Vec<String> = submitted["uploads"]
        .as_array()
        .map(|uploads| {
            uploads
                .iter()
                .filter_map(|u| u["id"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    let mut finished = Vec::with_capacity(ids.len());
    for id in ids {
        loop {
            let status = client.get(&format!("/uploads/{}", id), &[]).await?;
            match status["state"].as_str() {
                Some("queued") | Some("uploading") => {
                    tokio::time::sleep(Duration::from_millis(250)).await;
                }
                _ => {
                    finished.push(status);
                    break;
                }
            }
        }
    }

    print_json(&json!({ "uploads": finished }))
}

async fn delete(
    client: &ApiClient,
    bucket: &str,
    ids: Vec<String>,
    folder: Option<String>,
    yes: bool,
) -> Result<()> {
    let path = format!("/buckets/{}/objects/delete", bucket);
    let mut body = json!({ "ids": ids, "folder": folder, "confirm": yes });

    let (mut status, mut response) = client.post_json(&path, &body).await?;
    if status == StatusCode::CONFLICT && response["kind"] == "confirmation_required" {
        let count = response["details"]["count"].as_u64().unwrap_or_default();
        if !confirm(&format!("Delete {} objects from {}?", count, bucket))? {
            println!("Aborted");
            return Ok(());
        }
        body["confirm"] = Value::Bool(true);
        (status, response) = client.post_json(&path, &body).await?;
    }

    if !status.is_success() {
        anyhow::bail!("{}: {}", status, error_message(&response));
    }
    print_json(&response)
}

#[allow(clippy::too_many_arguments)]
async fn export(
    subject: String,
    section: String,
    format: String,
    records: PathBuf,
    output: PathBuf,
    date: Option<NaiveDate>,
    remote_url: Option<String>,
    offline: bool,
    timeout: Duration,
) -> Result<()> {
    let raw = tokio::fs::read_to_string(&records)
        .await
        .with_context(|| format!("Failed to read {}", records.display()))?;
    let records: Vec<Record> = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a JSON array of objects", records.display()))?;

    let mut pipeline = ExportPipeline::builder().offline(offline).timeout(timeout);
    if let Some(url) = remote_url {
        pipeline = pipeline.remote(Arc::new(HttpExportClient::new(&url, timeout)));
    }
    let pipeline = pipeline.build();

    let request = ExportRequest::builder()
        .subject_id(subject)
        .section_key(section)
        .format_key(format)
        .records(records)
        .maybe_date(date)
        .build();

    let artifact = pipeline.export(&request).await.context("Export failed")?;

    tokio::fs::create_dir_all(&output)
        .await
        .with_context(|| format!("Failed to create {}", output.display()))?;
    let target = output.join(&artifact.filename);
    tokio::fs::write(&target, &artifact.bytes)
        .await
        .with_context(|| format!("Failed to write {}", target.display()))?;

    print_json(&json!({
        "path": target.display().to_string(),
        "mime_type": artifact.mime_type,
        "bytes": artifact.bytes.len(),
        "route": artifact.route,
    }))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let client = ApiClient::new(&cli.url);

    match cli.command {
        Commands::Buckets => print_json(&client.get("/buckets", &[]).await?),
        Commands::List {
            bucket,
            folder,
            search,
            type_family,
            sort,
            order,
            page,
            per_page,
        } => {
            let mut query = vec![
                ("sort", sort),
                ("order", order),
                ("page", page.to_string()),
                ("per_page", per_page.to_string()),
            ];
            if let Some(folder) = folder {
                query.push(("folder", folder));
            }
            if let Some(search) = search {
                query.push(("search", search));
            }
            if let Some(family) = type_family {
                query.push(("type", family));
            }
            let listing = client
                .get(&format!("/buckets/{}/objects", bucket), &query)
                .await?;
            print_json(&listing)
        }
        Commands::Upload {
            bucket,
            files,
            folder,
            wait,
        } => upload(&client, &bucket, &files, folder, wait).await,
        Commands::Delete {
            bucket,
            ids,
            folder,
            yes,
        } => delete(&client, &bucket, ids, folder, yes).await,
        Commands::Export {
            subject,
            section,
            format,
            records,
            output,
            date,
            remote_url,
            offline,
            timeout_secs,
        } => {
            export(
                subject,
                section,
                format,
                records,
                output,
                date,
                remote_url,
                offline,
                Duration::from_secs(timeout_secs),
            )
            .await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from([
            "object-browser-cli",
            "delete",
            "research-datasets",
            "a",
            "b",
            "--folder",
            "runs",
            "--yes",
        ]);

        match cli.command {
            Commands::Delete {
                bucket,
                ids,
                folder,
                yes,
            } => {
                assert_eq!(bucket, "research-datasets");
                assert_eq!(ids, vec!["a", "b"]);
                assert_eq!(folder.as_deref(), Some("runs"));
                assert!(yes);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_offline_export_writes_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let records = dir.path().join("records.json");
        std::fs::write(
            &records,
            r#"[{"gene":"BRCA1","variant":"c.68_69del","rsid":"rs80357713"}]"#,
        )
        .unwrap();

        export(
            "P-42".to_string(),
            "variants_only".to_string(),
            "csv".to_string(),
            records,
            dir.path().join("out"),
            NaiveDate::from_ymd_opt(2024, 1, 2),
            None,
            true,
            Duration::from_secs(1),
        )
        .await
        .unwrap();

        let written = dir.path().join("out/P-42_variants_only_2024-01-02.csv");
        let content = std::fs::read_to_string(written).unwrap();
        assert!(content.starts_with("gene,variant,rsid,genotype,classification"));
        assert!(content.contains("BRCA1"));
    }
}
