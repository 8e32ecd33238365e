// conductor/src/core/value.rs

//! JSON-valued data flowing through a workflow: task parameters, task results
//! and the execution's shared context.

use std::collections::HashMap;

/// Opaque value produced by services and stored in the shared context.
pub type Value = serde_json::Value;

/// Parameters handed to a service invocation.
pub type Params = HashMap<String, Value>;

/// The execution-wide key/value context, grown by task outputs.
pub type Context = HashMap<String, Value>;

/// Key under which a non-object result of `task_id` is stored.
pub fn result_key(task_id: &str) -> String {
  format!("{}_result", task_id)
}

/// Merges a task result into the shared context.
///
/// Object results contribute each of their own keys; any other value lands
/// under `"<task_id>_result"`.
pub fn merge_result(context: &mut Context, task_id: &str, result: &Value) {
  match result {
    Value::Object(map) => {
      for (key, value) in map {
        context.insert(key.clone(), value.clone());
      }
    }
    other => {
      context.insert(result_key(task_id), other.clone());
    }
  }
}

/// Looks up a dotted path (`order.total`) in the context, descending into
/// nested JSON objects. The first segment is always a top-level context key.
pub fn lookup_path<'a>(context: &'a Context, path: &str) -> Option<&'a Value> {
  let mut segments = path.split('.');
  let first = segments.next()?;
  let mut current = context.get(first)?;
  for segment in segments {
    current = current.as_object()?.get(segment)?;
  }
  Some(current)
}
