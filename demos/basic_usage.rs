//! Basic usage example of readthrough.

use readthrough::{
    convert::Converter, error::Result, shape::Record, shape::Value, store::InMemoryStore,
    store::Store, Cache,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Example record: Employment
#[derive(Clone, Default, Serialize, Deserialize, Debug)]
struct Employment {
    id: String,
    employer_name: String,
    salary: f64,
}

impl Record for Employment {}

/// Simulated database lookup.
async fn fetch_employment(id: String) -> Result<Option<Employment>> {
    println!("  [DB] Fetching employment: {}", id);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let employment = match id.as_str() {
        "emp_001" => Some(Employment {
            id: id.clone(),
            employer_name: "Acme Corp".to_string(),
            salary: 75000.0,
        }),
        "emp_002" => Some(Employment {
            id: id.clone(),
            employer_name: "Tech Inc".to_string(),
            salary: 95000.0,
        }),
        _ => None,
    };

    Ok(employment)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Debug)
        .try_init()
        .ok();

    println!("\n=== readthrough - Basic Example ===\n");

    // 1. Initialize cache
    println!("1. Initializing in-memory store...");
    let cache = Cache::new(InMemoryStore::new(), Duration::from_secs(600))?;
    cache.register_json::<Employment>()?;
    println!("   ✓ Cache ready\n");

    // 2. First request - miss, producer runs
    println!("2. First request for employment (emp_001):");
    let mut employment = Employment::default();
    let used_cache = cache
        .get(
            "employment:emp_001",
            || fetch_employment("emp_001".to_string()),
            &mut employment,
        )
        .await?;
    println!(
        "   ✓ Loaded {} (${:.2}), from cache: {}\n",
        employment.employer_name, employment.salary, used_cache
    );

    // 3. Second request - hit
    println!("3. Second request for same employment (emp_001):");
    let mut employment = Employment::default();
    let used_cache = cache
        .get(
            "employment:emp_001",
            || fetch_employment("emp_001".to_string()),
            &mut employment,
        )
        .await?;
    println!(
        "   ✓ Loaded {} (${:.2}), from cache: {}\n",
        employment.employer_name, employment.salary, used_cache
    );

    // 4. Concurrent misses share one database call
    println!("4. Ten concurrent requests for emp_002:");
    let mut handles = vec![];
    for _ in 0..10 {
        let cache = cache.clone();
        handles.push(tokio::spawn(async move {
            let mut employment = Employment::default();
            cache
                .get(
                    "employment:emp_002",
                    || fetch_employment("emp_002".to_string()),
                    &mut employment,
                )
                .await
                .map(|_| employment)
        }));
    }
    for handle in handles {
        if let Ok(Ok(employment)) = handle.await {
            println!("   ✓ {}", employment.employer_name);
        }
    }
    println!();

    // 5. Negative caching - absence is remembered
    println!("5. Missing employment (emp_404) with negative caching:");
    for round in 1..=2 {
        let mut employment = Employment::default();
        let used_cache = cache
            .get_with_options(
                "employment:emp_404",
                || fetch_employment("emp_404".to_string()),
                &mut employment,
                |opts| {
                    opts.with_nil_expire(Duration::from_secs(30));
                },
            )
            .await?;
        println!("   ✓ Round {}: from cache: {}", round, used_cache);
    }
    println!();

    // 6. Stored JSON text decoded into a record
    println!("6. JSON text written by another service:");
    cache
        .store()
        .set(
            "employment:emp_003",
            Value::from(r#"{"id":"emp_003","employer_name":"Globex","salary":64000.0}"#),
            Duration::from_secs(600),
        )
        .await?;
    let mut employment = Employment::default();
    cache
        .get(
            "employment:emp_003",
            || fetch_employment("emp_003".to_string()),
            &mut employment,
        )
        .await?;
    println!("   ✓ Decoded {:?}\n", employment);

    // 7. Call-scoped converter
    println!("7. Call-scoped converter for yes/no flags:");
    cache
        .store()
        .set("flag:beta", Value::from("yes"), Duration::from_secs(600))
        .await?;
    let mut enabled = false;
    cache
        .get_with_options(
            "flag:beta",
            || async { Ok(Some(false)) },
            &mut enabled,
            |opts| {
                opts.with_converter(Converter::new(|text: String| match text.as_str() {
                    "yes" => Ok(true),
                    "no" => Ok(false),
                    other => Err(format!("unexpected flag {}", other)),
                }));
            },
        )
        .await?;
    println!("   ✓ beta enabled: {}\n", enabled);

    // 8. Invalidation
    println!("8. Deleting emp_001 and reading again:");
    cache.del("employment:emp_001").await?;
    let mut employment = Employment::default();
    let used_cache = cache
        .get(
            "employment:emp_001",
            || fetch_employment("emp_001".to_string()),
            &mut employment,
        )
        .await?;
    println!("   ✓ from cache: {}\n", used_cache);

    println!("=== Example Complete ===\n");

    Ok(())
}
