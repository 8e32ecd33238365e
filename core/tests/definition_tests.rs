// tests/definition_tests.rs
use conductor::workflow::graph;
use conductor::{Backoff, ConductorError, ErrorHandling, TaskDefinition, WorkflowDefinition};
use serde_json::json;
use std::time::Duration;

#[test]
fn test_builder_captures_every_field() {
  let task = TaskDefinition::builder("charge", "payment", "charge_card")
    .name("Charge card")
    .param("amount", 120)
    .timeout(Duration::from_secs(3))
    .retries(2, Duration::from_millis(250))
    .backoff(Backoff::Exponential {
      multiplier: 2.0,
      max_delay: Duration::from_secs(2),
    })
    .depends_on_all(["validate", "reserve"])
    .condition("approved == true")
    .compensate_with("refund")
    .build();

  assert_eq!(task.task_id(), "charge");
  assert_eq!(task.name(), "Charge card");
  assert_eq!(task.service_name(), "payment");
  assert_eq!(task.method(), "charge_card");
  assert_eq!(task.parameters().get("amount"), Some(&json!(120)));
  assert_eq!(task.timeout(), Some(Duration::from_secs(3)));
  assert_eq!(task.retry_count(), 2);
  assert_eq!(task.retry_delay(), Duration::from_millis(250));
  assert!(matches!(task.backoff(), Backoff::Exponential { .. }));
  assert_eq!(
    task.depends_on().iter().map(String::as_str).collect::<Vec<_>>(),
    vec!["reserve", "validate"]
  );
  assert_eq!(task.condition(), Some("approved == true"));
  assert_eq!(task.compensate_with(), Some("refund"));

  let plain = TaskDefinition::builder("ping", "health", "ping").build();
  assert_eq!(plain.name(), "ping");
  assert_eq!(plain.retry_count(), 0);
  assert_eq!(plain.retry_delay(), Duration::ZERO);
  assert_eq!(plain.backoff(), Backoff::Fixed);
  assert!(plain.timeout().is_none());
  assert!(plain.depends_on().is_empty());
}

#[test]
fn test_workflow_defaults() {
  let definition = WorkflowDefinition::builder("w", "Workflow")
    .task(TaskDefinition::builder("a", "svc", "a"))
    .build()
    .unwrap();
  assert_eq!(definition.workflow_id(), "w");
  assert_eq!(definition.name(), "Workflow");
  assert_eq!(definition.error_handling(), ErrorHandling::FailFast);
  assert!(definition.global_timeout().is_none());
  assert_eq!(definition.tasks().len(), 1);
  assert!(definition.task("a").is_some());
  assert!(definition.task("zzz").is_none());
}

#[test]
fn test_duplicate_task_ids_are_rejected() {
  let result = WorkflowDefinition::builder("dup", "Dup")
    .task(TaskDefinition::builder("a", "svc", "one"))
    .task(TaskDefinition::builder("a", "svc", "two"))
    .build();
  assert!(matches!(
    result,
    Err(ConductorError::DuplicateTask { ref task_id, .. }) if task_id == "a"
  ));
}

#[test]
fn test_unknown_references_are_rejected() {
  let unknown_dep = WorkflowDefinition::builder("w", "W")
    .task(TaskDefinition::builder("a", "svc", "a").depends_on("ghost"))
    .build();
  assert!(matches!(
    unknown_dep,
    Err(ConductorError::UnknownDependency { ref dependency, .. }) if dependency == "ghost"
  ));

  let unknown_comp = WorkflowDefinition::builder("w", "W")
    .task(TaskDefinition::builder("a", "svc", "a").compensate_with("undo"))
    .build();
  assert!(matches!(
    unknown_comp,
    Err(ConductorError::UnknownCompensation { ref compensation, .. }) if compensation == "undo"
  ));
}

#[test]
fn test_structural_mistakes_are_rejected() {
  let self_compensating = WorkflowDefinition::builder("w", "W")
    .task(TaskDefinition::builder("a", "svc", "a").compensate_with("a"))
    .build();
  assert!(matches!(self_compensating, Err(ConductorError::InvalidDefinition { .. })));

  let depends_on_compensation = WorkflowDefinition::builder("w", "W")
    .task(TaskDefinition::builder("a", "svc", "a").compensate_with("undo"))
    .task(TaskDefinition::builder("undo", "svc", "undo"))
    .task(TaskDefinition::builder("b", "svc", "b").depends_on("undo"))
    .build();
  assert!(matches!(depends_on_compensation, Err(ConductorError::InvalidDefinition { .. })));

  let no_service = WorkflowDefinition::builder("w", "W")
    .task(TaskDefinition::builder("a", "", "a"))
    .build();
  assert!(matches!(no_service, Err(ConductorError::InvalidDefinition { .. })));

  let no_id = WorkflowDefinition::builder("", "W").build();
  assert!(matches!(no_id, Err(ConductorError::InvalidDefinition { .. })));
}

#[test]
fn test_cycles_are_rejected() {
  let cyclic = WorkflowDefinition::builder("loop", "Loop")
    .task(TaskDefinition::builder("a", "svc", "a").depends_on("c"))
    .task(TaskDefinition::builder("b", "svc", "b").depends_on("a"))
    .task(TaskDefinition::builder("c", "svc", "c").depends_on("b"))
    .build();
  match cyclic {
    Err(ConductorError::DependencyCycle { workflow_id, task_id }) => {
      assert_eq!(workflow_id, "loop");
      assert!(["a", "b", "c"].contains(&task_id.as_str()));
    }
    other => panic!("expected DependencyCycle, got {:?}", other),
  }

  let self_loop = WorkflowDefinition::builder("self", "Self")
    .task(TaskDefinition::builder("a", "svc", "a").depends_on("a"))
    .build();
  assert!(matches!(self_loop, Err(ConductorError::DependencyCycle { .. })));

  let diamond = WorkflowDefinition::builder("diamond", "Diamond")
    .task(TaskDefinition::builder("top", "svc", "a"))
    .task(TaskDefinition::builder("left", "svc", "b").depends_on("top"))
    .task(TaskDefinition::builder("right", "svc", "c").depends_on("top"))
    .task(TaskDefinition::builder("bottom", "svc", "d").depends_on_all(["left", "right"]))
    .build();
  assert!(diamond.is_ok());
}

#[test]
fn test_long_chain_authored_in_reverse_validates() {
  const LENGTH: usize = 20_000;
  let mut builder = WorkflowDefinition::builder("long_chain", "Long chain");
  for i in (0..LENGTH).rev() {
    let mut task = TaskDefinition::builder(format!("t{}", i), "svc", "step");
    if i > 0 {
      task = task.depends_on(format!("t{}", i - 1));
    }
    builder = builder.task(task);
  }
  let definition = builder.build().unwrap();
  assert_eq!(definition.tasks().len(), LENGTH);

  // Closing the chain into a loop is still caught.
  let mut looped = WorkflowDefinition::builder("long_loop", "Long loop");
  for i in (0..LENGTH).rev() {
    let previous = if i == 0 { LENGTH - 1 } else { i - 1 };
    looped = looped.task(
      TaskDefinition::builder(format!("t{}", i), "svc", "step").depends_on(format!("t{}", previous)),
    );
  }
  assert!(matches!(looped.build(), Err(ConductorError::DependencyCycle { .. })));
}

#[test]
fn test_shared_compensation_target_is_rejected() {
  let result = WorkflowDefinition::builder("saga", "Saga")
    .task(TaskDefinition::builder("reserve", "inventory", "reserve").compensate_with("undo"))
    .task(TaskDefinition::builder("charge", "payment", "charge").compensate_with("undo"))
    .task(TaskDefinition::builder("undo", "ops", "undo"))
    .build();
  match result {
    Err(ConductorError::InvalidDefinition { message, .. }) => {
      assert!(message.contains("'reserve'"), "{}", message);
      assert!(message.contains("'charge'"), "{}", message);
      assert!(message.contains("'undo'"), "{}", message);
    }
    other => panic!("expected InvalidDefinition, got {:?}", other),
  }
}

#[test]
fn test_malformed_condition_is_rejected() {
  let result = WorkflowDefinition::builder("w", "W")
    .task(TaskDefinition::builder("a", "svc", "a").condition("available = true"))
    .build();
  match result {
    Err(ConductorError::InvalidCondition { task_id, .. }) => assert_eq!(task_id, "a"),
    other => panic!("expected InvalidCondition, got {:?}", other),
  }
}

#[test]
fn test_json_definition_round_trip() {
  let json = r#"{
    "workflow_id": "user_onboarding",
    "name": "User onboarding",
    "global_timeout": 30000,
    "error_handling": "compensate",
    "tasks": [
      { "task_id": "create_user", "service_name": "user", "method": "create",
        "parameters": { "plan": "pro" }, "timeout": 5000,
        "retry_count": 2, "retry_delay": 1000, "compensate_with": "delete_user" },
      { "task_id": "delete_user", "service_name": "user", "method": "delete" },
      { "task_id": "welcome", "service_name": "email", "method": "send",
        "depends_on": ["create_user"], "condition": "plan == 'pro'",
        "backoff": { "kind": "exponential", "multiplier": 2.0, "max_delay": 8000 } }
    ]
  }"#;

  let definition = WorkflowDefinition::from_json(json).unwrap();
  assert_eq!(definition.error_handling(), ErrorHandling::Compensate);
  assert_eq!(definition.global_timeout(), Some(Duration::from_secs(30)));
  let create = definition.task("create_user").unwrap();
  assert_eq!(create.timeout(), Some(Duration::from_secs(5)));
  assert_eq!(create.retry_delay(), Duration::from_secs(1));
  assert_eq!(create.parameters().get("plan"), Some(&json!("pro")));
  let welcome = definition.task("welcome").unwrap();
  assert_eq!(
    welcome.backoff(),
    Backoff::Exponential {
      multiplier: 2.0,
      max_delay: Duration::from_secs(8),
    }
  );

  let reparsed = WorkflowDefinition::from_json(&definition.to_json().unwrap()).unwrap();
  assert_eq!(reparsed, definition);
}

#[test]
fn test_json_definitions_are_validated() {
  let cyclic = r#"{ "workflow_id": "w", "tasks": [
    { "task_id": "a", "service_name": "s", "method": "m", "depends_on": ["b"] },
    { "task_id": "b", "service_name": "s", "method": "m", "depends_on": ["a"] } ] }"#;
  assert!(matches!(
    WorkflowDefinition::from_json(cyclic),
    Err(ConductorError::DependencyCycle { .. })
  ));
  assert!(matches!(
    WorkflowDefinition::from_json("{ not json"),
    Err(ConductorError::InvalidDefinition { .. })
  ));
  assert!(matches!(
    WorkflowDefinition::from_json(r#"{ "workflow_id": "w", "error_handling": "retry_forever" }"#),
    Err(ConductorError::InvalidDefinition { .. })
  ));
}

#[test]
fn test_parallel_groups_share_identical_dependency_sets() {
  let definition = WorkflowDefinition::builder("g", "Groups")
    .task(TaskDefinition::builder("root", "svc", "r"))
    .task(TaskDefinition::builder("b", "svc", "b").depends_on("root"))
    .task(TaskDefinition::builder("x", "svc", "x"))
    .task(TaskDefinition::builder("c", "svc", "c").depends_on("root"))
    .task(TaskDefinition::builder("d", "svc", "d").depends_on_all(["root", "x"]))
    .build()
    .unwrap();

  let ready: Vec<&TaskDefinition> = definition.tasks().iter().collect();
  let groups = graph::parallel_groups(&ready);
  let ids: Vec<Vec<&str>> = groups
    .iter()
    .map(|g| g.iter().map(|t| t.task_id()).collect())
    .collect();
  assert_eq!(ids, vec![vec!["root", "x"], vec!["b", "c"], vec!["d"]]);
}

#[test]
fn test_compensation_only_tasks() {
  let definition = WorkflowDefinition::builder("saga", "Saga")
    .task(TaskDefinition::builder("reserve", "inventory", "reserve").compensate_with("release"))
    .task(TaskDefinition::builder("release", "inventory", "release"))
    .task(TaskDefinition::builder("charge", "payment", "charge").compensate_with("refund"))
    .task(TaskDefinition::builder("refund", "payment", "refund"))
    .build()
    .unwrap();
  let only = graph::compensation_only(&definition);
  assert_eq!(only.len(), 2);
  assert!(only.contains("release"));
  assert!(only.contains("refund"));
}
