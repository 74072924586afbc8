use crate::cli::{Cli, Params};
use crate::timer::Timer;
use crate::workload::{self, Event};
use anyhow::{Context, Result};
use csmt::{serial, BatchEngine, Dispatcher, LiveEngine, NodeHash, Operation, Tree};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

struct EngineRun {
    root: NodeHash,
    response_times: Vec<Duration>,
    elapsed: Duration,
}

pub fn run(cli: &Cli, params: &Params) -> Result<()> {
    info!(
        depth = params.depth,
        batch = params.batch_size,
        workers = params.num_workers,
        ops = params.total_ops,
        read_percent = cli.read_percent,
        "generating workload"
    );
    let stream = workload::generate(params.depth, params.total_ops, cli.read_percent, cli.seed);

    info!("running live engine");
    let live = run_live(params, &stream)?;
    info!(elapsed_ms = live.elapsed.as_millis() as u64, "live finished");

    info!("running angela engine");
    let angela = run_angela(params, &stream)?;
    info!(
        elapsed_ms = angela.elapsed.as_millis() as u64,
        "angela finished"
    );

    info!("running serial baseline");
    let serial_run = run_serial(params, &stream)?;
    info!(
        elapsed_ms = serial_run.elapsed.as_millis() as u64,
        "serial finished"
    );

    let mut live_timer = Timer::new("live");
    live_timer.record_all(&live.response_times);
    let mut angela_timer = Timer::new("angela");
    angela_timer.record_all(&angela.response_times);
    let mut serial_timer = Timer::new("serial");
    serial_timer.record_all(&serial_run.response_times);

    println!("==== results ====");
    live_timer.print();
    angela_timer.print();
    serial_timer.print();

    println!();
    println!("live root   : {}", live.root);
    println!("angela root : {}", angela.root);
    println!("serial root : {}", serial_run.root);
    println!(
        "live   vs serial : {}",
        verdict(&live.root, &serial_run.root)
    );
    println!(
        "angela vs serial : {}",
        verdict(&angela.root, &serial_run.root)
    );

    write_response_csv(
        &cli.csv_dir.join("live_response_times.csv"),
        &live.response_times,
    )?;
    write_response_csv(
        &cli.csv_dir.join("angela_response_times.csv"),
        &angela.response_times,
    )?;
    write_response_csv(
        &cli.csv_dir.join("serial_response_times.csv"),
        &serial_run.response_times,
    )?;
    write_summary_csv(
        &cli.csv_dir.join("summary_metrics.csv"),
        params,
        &live_timer,
        &angela_timer,
        &serial_timer,
    )?;
    info!("csv files written to {}", cli.csv_dir.display());

    Ok(())
}

fn verdict(root: &NodeHash, baseline: &NodeHash) -> &'static str {
    if root == baseline {
        "match"
    } else {
        "MISMATCH"
    }
}

/// Play the stream back in real time against the live dispatcher: sleep
/// until each event's arrival offset, submit, and collect per-operation
/// response times at join.
fn run_live(params: &Params, stream: &[Event]) -> Result<EngineRun> {
    let tree = Arc::new(Tree::new(params.depth)?);
    let engine = Arc::new(LiveEngine::new());
    let dispatcher = Dispatcher::new(tree.clone(), engine, params.num_workers)?;

    let started = Instant::now();
    for event in stream {
        let target = started + event.arrival;
        let now = Instant::now();
        if target > now {
            std::thread::sleep(target - now);
        }
        dispatcher.submit(event.op.clone())?;
    }
    let per_worker = dispatcher.join()?;
    let elapsed = started.elapsed();

    Ok(EngineRun {
        root: tree.root_hash(),
        response_times: per_worker.into_iter().flatten().collect(),
        elapsed,
    })
}

/// Collect the stream's updates into fixed-size batches and hand each batch
/// to the engine. An operation's response time is the gap between its
/// arrival and its batch finishing.
fn run_angela(params: &Params, stream: &[Event]) -> Result<EngineRun> {
    let tree = Arc::new(Tree::new(params.depth)?);
    let engine = BatchEngine::new(params.num_workers)?;

    let mut response_times = Vec::new();
    let mut batch = Vec::with_capacity(params.batch_size);
    let mut arrivals = Vec::with_capacity(params.batch_size);
    let started = Instant::now();

    for event in stream {
        let Operation::Update { key, value } = &event.op else {
            continue;
        };
        batch.push((key.clone(), value.clone()));
        arrivals.push(event.arrival);
        if batch.len() == params.batch_size {
            drain_batch(
                &engine,
                &tree,
                &mut batch,
                &mut arrivals,
                started,
                &mut response_times,
            )?;
        }
    }
    drain_batch(
        &engine,
        &tree,
        &mut batch,
        &mut arrivals,
        started,
        &mut response_times,
    )?;

    Ok(EngineRun {
        root: tree.root_hash(),
        response_times,
        elapsed: started.elapsed(),
    })
}

fn drain_batch(
    engine: &BatchEngine,
    tree: &Arc<Tree>,
    batch: &mut Vec<(String, String)>,
    arrivals: &mut Vec<Duration>,
    started: Instant,
    response_times: &mut Vec<Duration>,
) -> Result<()> {
    if batch.is_empty() {
        return Ok(());
    }
    engine.process_batch(tree, batch)?;
    let finish = started.elapsed();
    response_times.extend(
        arrivals
            .drain(..)
            .map(|arrival| finish.saturating_sub(arrival)),
    );
    batch.clear();
    Ok(())
}

fn run_serial(params: &Params, stream: &[Event]) -> Result<EngineRun> {
    let mut tree = Tree::new(params.depth)?;
    let mut response_times = Vec::with_capacity(stream.len());
    let started = Instant::now();

    for event in stream {
        match &event.op {
            Operation::Update { key, value } => serial::update(&mut tree, key, value)?,
            Operation::ReadRoot => {
                let _ = tree.root_hash();
            }
            Operation::ReadLeaf { key } => {
                let _ = tree.leaf_hash(key)?;
            }
        }
        response_times.push(started.elapsed().saturating_sub(event.arrival));
    }

    Ok(EngineRun {
        root: tree.root_hash(),
        response_times,
        elapsed: started.elapsed(),
    })
}

/// One response time per line, in microseconds.
fn write_response_csv(path: &Path, times: &[Duration]) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut out = BufWriter::new(file);
    for time in times {
        writeln!(out, "{:.2}", time.as_secs_f64() * 1e6)?;
    }
    Ok(())
}

fn write_summary_csv(
    path: &Path,
    params: &Params,
    live: &Timer,
    angela: &Timer,
    serial: &Timer,
) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut out = BufWriter::new(file);
    writeln!(out, "depth,threads,batch,ops,avg_live,avg_angela,avg_serial")?;
    writeln!(
        out,
        "{},{},{},{},{:.2},{:.2},{:.2}",
        params.depth,
        params.num_workers,
        params.batch_size,
        params.total_ops,
        live.mean_us(),
        angela.mean_us(),
        serial.mean_us(),
    )?;
    Ok(())
}
