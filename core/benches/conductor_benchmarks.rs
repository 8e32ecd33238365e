use async_trait::async_trait;
use conductor::{
  Context, Engine, Params, Service, ServiceRegistry, TaskDefinition, Value, WorkflowDefinition, WorkflowStatus,
};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::json;
use std::sync::Arc;
use tokio::runtime::Runtime; // To run async code within Criterion

// --- Benchmark Service ---

/// Returns a small object immediately, optionally after a short sleep.
struct BenchService {
  delay_micros: u64,
}

#[async_trait]
impl Service for BenchService {
  async fn execute(&self, method: &str, _params: &Params, _context: &Context) -> anyhow::Result<Value> {
    if self.delay_micros > 0 {
      tokio::time::sleep(std::time::Duration::from_micros(self.delay_micros)).await;
    }
    Ok(json!({ method: true }))
  }

  fn name(&self) -> &str {
    "bench"
  }
}

fn engine(delay_micros: u64) -> Engine {
  let registry = Arc::new(ServiceRegistry::new());
  registry.register("bench", BenchService { delay_micros });
  Engine::new(registry)
}

/// root -> `width` parallel tasks -> join
fn fan_out_workflow(width: usize) -> Arc<WorkflowDefinition> {
  let mut builder = WorkflowDefinition::builder("fan_out", "Fan out").task(TaskDefinition::builder("root", "bench", "root"));
  let mut leaves = Vec::with_capacity(width);
  for i in 0..width {
    let task_id = format!("leaf_{}", i);
    builder = builder.task(TaskDefinition::builder(task_id.clone(), "bench", task_id.clone()).depends_on("root"));
    leaves.push(task_id);
  }
  builder = builder.task(TaskDefinition::builder("join", "bench", "join").depends_on_all(leaves));
  Arc::new(builder.build().unwrap())
}

/// A straight chain of `length` tasks.
fn chain_workflow(length: usize) -> Arc<WorkflowDefinition> {
  let mut builder = WorkflowDefinition::builder("chain", "Chain");
  for i in 0..length {
    let mut task = TaskDefinition::builder(format!("step_{}", i), "bench", "step");
    if i > 0 {
      task = task.depends_on(format!("step_{}", i - 1));
    }
    builder = builder.task(task);
  }
  Arc::new(builder.build().unwrap())
}

async fn run_once(engine: &Engine, definition: &Arc<WorkflowDefinition>) {
  let id = engine.execute_workflow(Arc::clone(definition), Context::new()).unwrap();
  let execution = engine.wait(id).await.unwrap();
  assert_eq!(execution.status, WorkflowStatus::Completed);
  engine.discard(id);
}

// --- Benchmark Functions ---

fn bench_fan_out(c: &mut Criterion) {
  let mut group = c.benchmark_group("FanOut");
  let rt = Runtime::new().unwrap();

  for width in [1usize, 10, 100] {
    let definition = fan_out_workflow(width);
    group.throughput(Throughput::Elements(width as u64 + 2));
    for delay_micros in [0u64, 100] {
      let engine = engine(delay_micros);
      group.bench_with_input(
        BenchmarkId::new(format!("width_{}", width), format!("delay_{}us", delay_micros)),
        &definition,
        |b, definition| b.to_async(&rt).iter(|| run_once(&engine, definition)),
      );
    }
  }
  group.finish();
}

fn bench_chain(c: &mut Criterion) {
  let mut group = c.benchmark_group("Chain");
  let rt = Runtime::new().unwrap();
  let engine = engine(0);

  for length in [1usize, 10, 50] {
    let definition = chain_workflow(length);
    group.throughput(Throughput::Elements(length as u64));
    group.bench_with_input(BenchmarkId::from_parameter(length), &definition, |b, definition| {
      b.to_async(&rt).iter(|| run_once(&engine, definition))
    });
  }
  group.finish();
}

fn bench_condition_evaluation(c: &mut Criterion) {
  let context: Context = [
    ("available".to_string(), json!(true)),
    ("quantity".to_string(), json!(12)),
    ("order".to_string(), json!({ "total": 250, "tier": "gold" })),
  ]
  .into_iter()
  .collect();
  let condition = "available && quantity >= 10 && (order.tier == 'gold' || order.total > 1000)";
  let parsed = conductor::condition::parse(condition).unwrap();
  let evaluator = conductor::ConditionEvaluator;

  c.bench_function("condition_parse_and_evaluate", |b| {
    b.iter(|| evaluator.evaluate(std::hint::black_box(condition), &context))
  });
  c.bench_function("condition_evaluate_parsed", |b| {
    b.iter(|| evaluator.evaluate_expr(std::hint::black_box(&parsed), &context))
  });
}

criterion_group!(benches, bench_fan_out, bench_chain, bench_condition_evaluation);
criterion_main!(benches);
