use anyhow::Context;
use aws_config::BehaviorVersion;
use aws_lambda_events::event::s3::{S3Bucket, S3Entity, S3Event, S3EventRecord, S3Object};
use aws_sdk_lambda::Client;
use clap::Parser;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio::time::Instant;

const EXTENSIONS: [&str; 4] = ["jpg", "png", "gif", "webp"];

#[derive(Default)]
struct Stats {
    complete_count: usize,
    failed_count: usize,
    error_count: usize,
    total_latency_ms: f64,
    last_failure: Option<String>,
}

#[derive(Deserialize)]
struct FunctionResponse {
    #[serde(rename = "statusCode")]
    status_code: u16,
    body: String,
}

#[derive(Debug, PartialEq)]
enum Outcome {
    Complete,
    Failed(String),
    Unexpected,
}

#[derive(Parser, Debug)]
#[command(name = "invoke-test")]
#[command(about = "Invoke Lambda function with synthetic S3 object-created notifications")]
struct Args {
    /// Lambda function name
    function: String,

    /// Number of invocations to run
    #[arg(long, default_value = "100")]
    iters: usize,

    /// Number of parallel tasks
    #[arg(long, default_value = "1")]
    threads: usize,

    /// Records per notification
    #[arg(long, default_value = "3")]
    records: usize,

    /// Bucket name to put in every record
    #[arg(long, default_value = "image-uploads")]
    bucket: String,

    /// Drop the object key from the last record of every Nth notification (0 = never)
    #[arg(long, default_value = "0")]
    fail_every: usize,
}

fn random_key(rng: &mut impl Rng) -> String {
    let id: u32 = rng.gen();
    let ext = EXTENSIONS[rng.gen_range(0..EXTENSIONS.len())];
    format!("uploads/{id:08x}.{ext}")
}

fn build_notification(
    rng: &mut impl Rng,
    bucket: &str,
    records: usize,
    drop_key: bool,
) -> serde_json::Result<Value> {
    let event = S3Event {
        records: (0..records)
            .map(|_| S3EventRecord {
                event_version: Some("2.1".to_string()),
                event_source: Some("aws:s3".to_string()),
                event_name: Some("ObjectCreated:Put".to_string()),
                s3: S3Entity {
                    bucket: S3Bucket {
                        name: Some(bucket.to_string()),
                        arn: Some(format!("arn:aws:s3:::{bucket}")),
                        ..Default::default()
                    },
                    object: S3Object {
                        key: Some(random_key(&mut *rng)),
                        size: Some(rng.gen_range(1024..=4_194_304)),
                        ..Default::default()
                    },
                    ..Default::default()
                },
                ..Default::default()
            })
            .collect(),
    };
    let mut event = serde_json::to_value(event)?;

    // Removed rather than set to null: a null key is still a key.
    if drop_key {
        if let Some(object) = event
            .get_mut("Records")
            .and_then(Value::as_array_mut)
            .and_then(|records| records.last_mut())
            .and_then(|record| record.pointer_mut("/s3/object"))
            .and_then(Value::as_object_mut)
        {
            object.remove("key");
        }
    }

    Ok(event)
}

fn classify(payload: &str) -> Outcome {
    let Ok(response) = serde_json::from_str::<FunctionResponse>(payload) else {
        return Outcome::Unexpected;
    };
    let Ok(body) = serde_json::from_str::<String>(&response.body) else {
        return Outcome::Unexpected;
    };

    match response.status_code {
        200 => Outcome::Complete,
        500 => Outcome::Failed(body),
        _ => Outcome::Unexpected,
    }
}

async fn invoke(client: &Client, function_name: &str, payload: &Value) -> anyhow::Result<String> {
    let response = client
        .invoke()
        .function_name(function_name)
        .payload(aws_sdk_lambda::primitives::Blob::new(serde_json::to_vec(
            payload,
        )?))
        .send()
        .await
        .context("invoke failed")?;

    Ok(response
        .payload()
        .map(|b| String::from_utf8_lossy(b.as_ref()).to_string())
        .unwrap_or_else(|| "No response".to_string()))
}

struct Batch {
    thread_id: usize,
    start: usize,
    end: usize,
    total: usize,
}

async fn run_invocations(client: Arc<Client>, args: Arc<Args>, batch: Batch, stats: Arc<Mutex<Stats>>) {
    let mut rng = StdRng::from_entropy();

    for i in batch.start..=batch.end {
        let drop_key = args.fail_every > 0 && i % args.fail_every == 0;
        let started = Instant::now();
        let result = match build_notification(&mut rng, &args.bucket, args.records, drop_key) {
            Ok(payload) => invoke(&client, &args.function, &payload).await,
            Err(e) => Err(e.into()),
        };
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        match result {
            Ok(response_payload) => {
                let outcome = classify(&response_payload);

                {
                    let mut stats = stats.lock().await;
                    match &outcome {
                        Outcome::Complete => {
                            stats.complete_count += 1;
                            stats.total_latency_ms += latency_ms;
                        }
                        Outcome::Failed(body) => {
                            stats.failed_count += 1;
                            stats.last_failure = Some(body.clone());
                        }
                        Outcome::Unexpected => stats.error_count += 1,
                    }
                }

                println!(
                    "[Thread {}: {}/{}] {} record(s), drop_key={} => {} ({:.3}ms)",
                    batch.thread_id, i, batch.total, args.records, drop_key, response_payload, latency_ms
                );
            }
            Err(e) => {
                {
                    let mut stats = stats.lock().await;
                    stats.error_count += 1;
                }

                eprintln!(
                    "[Thread {}: {}/{}] Error invoking {}: {:#}",
                    batch.thread_id, i, batch.total, args.function, e
                );
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Arc::new(Args::parse());
    anyhow::ensure!(args.threads > 0, "--threads must be at least 1");

    println!(
        "Running {} invocations across {} thread(s)",
        args.iters, args.threads
    );

    let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let client = Arc::new(Client::new(&config));

    let stats = Arc::new(Mutex::new(Stats::default()));

    let iters_per_thread = args.iters / args.threads;
    let remainder = args.iters % args.threads;

    let mut tasks = JoinSet::new();

    let mut start = 1;
    for t in 1..=args.threads {
        let end = if t == args.threads {
            start + iters_per_thread - 1 + remainder
        } else {
            start + iters_per_thread - 1
        };

        let batch = Batch {
            thread_id: t,
            start,
            end,
            total: args.iters,
        };
        tasks.spawn(run_invocations(
            Arc::clone(&client),
            Arc::clone(&args),
            batch,
            Arc::clone(&stats),
        ));

        start = end + 1;
    }

    while let Some(result) = tasks.join_next().await {
        if let Err(e) = result {
            eprintln!("Task failed: {}", e);
        }
    }

    let stats = stats.lock().await;
    println!("Completed {} invocations", args.iters);
    println!();
    println!("Results:");
    println!("  200 Complete: {}", stats.complete_count);
    println!("  500 Failed:   {}", stats.failed_count);
    println!("  Errors:       {}", stats.error_count);
    if stats.complete_count > 0 {
        let avg_latency = stats.total_latency_ms / stats.complete_count as f64;
        println!("  Avg latency:  {:.3}ms", avg_latency);
    }
    if let Some(body) = &stats.last_failure {
        println!("  Last failure: {body}");
    }
    Ok(())
}
