//! Bundled workflows for the `run` and `topology` subcommands.

use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::{json, Value};

use weave_core::error::{GraphValidationError, Result, WeaveError};
use weave_core::traits::Agent;
use weave_core::types::{Outcome, Payload};
use weave_engine::{forward, output, router, AgentExecutor, FnExecutor, WorkflowBuilder, WorkflowGraph};

pub struct Demo {
    pub name: &'static str,
    pub about: &'static str,
    pub default_input: fn() -> Payload,
    pub build: fn() -> std::result::Result<WorkflowGraph, GraphValidationError>,
}

pub fn all() -> &'static [Demo] {
    &DEMOS
}

pub fn find(name: &str) -> Option<&'static Demo> {
    DEMOS.iter().find(|d| d.name == name)
}

static DEMOS: [Demo; 6] = [
    Demo {
        name: "sequential",
        about: "A doubles an integer, B adds one and yields",
        default_input: || json!(5),
        build: sequential,
    },
    Demo {
        name: "fan-out",
        about: "A feeds B and C concurrently, D joins their results in declared order",
        default_input: || json!("x"),
        build: fan_out,
    },
    Demo {
        name: "router",
        about: "R routes numbers above 10 to Big and the rest to Small",
        default_input: || json!(20),
        build: conditional,
    },
    Demo {
        name: "failing",
        about: "A validator that always rejects its input",
        default_input: || json!("anything"),
        build: failing,
    },
    Demo {
        name: "retry",
        about: "Validation loop that retries short inputs three times before giving up",
        default_input: || json!("hi"),
        build: retry,
    },
    Demo {
        name: "travel-planner",
        about: "Three planning agents in parallel, merged into one itinerary",
        default_input: || json!("Lisbon"),
        build: travel_planner,
    },
];

fn as_int(payload: &Payload) -> Result<i64> {
    payload
        .as_i64()
        .ok_or_else(|| WeaveError::handler(format!("expected an integer, got {}", payload)))
}

fn as_text(payload: &Payload) -> Result<String> {
    payload
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| WeaveError::handler(format!("expected a string, got {}", payload)))
}

fn sequential() -> std::result::Result<WorkflowGraph, GraphValidationError> {
    WorkflowBuilder::new()
        .add_executor("A", forward(|p| Ok(json!(as_int(&p)? * 2))).with_description("double"))
        .add_executor("B", output(|p| Ok(json!(as_int(&p)? + 1))).with_description("add one"))
        .set_start("A")
        .add_edge("A", "B")
        .build()
}

fn fan_out() -> std::result::Result<WorkflowGraph, GraphValidationError> {
    WorkflowBuilder::new()
        .add_executor("A", forward(Ok))
        .add_executor("B", forward(|p| Ok(json!(format!("{}-b", as_text(&p)?)))))
        .add_executor("C", forward(|p| Ok(json!(format!("{}-c", as_text(&p)?)))))
        .add_executor(
            "D",
            FnExecutor::new(|input| {
                let parts = input
                    .into_collected()?
                    .iter()
                    .map(as_text)
                    .collect::<Result<Vec<_>>>()?;
                Ok(Outcome::yield_output(parts.join(", ")))
            })
            .with_description("join"),
        )
        .set_start("A")
        .add_fan_out("A", ["B", "C"])
        .add_fan_in(["B", "C"], "D")
        .build()
}

fn conditional() -> std::result::Result<WorkflowGraph, GraphValidationError> {
    WorkflowBuilder::new()
        .add_executor(
            "R",
            router(|p| Ok(if as_int(p)? > 10 { "big" } else { "small" }.to_string())),
        )
        .add_executor("Big", output(|p| Ok(json!(format!("big: {}", p)))))
        .add_executor("Small", output(|p| Ok(json!(format!("small: {}", p)))))
        .set_start("R")
        .add_conditional("R", [("big", "Big"), ("small", "Small")])
        .build()
}

fn failing() -> std::result::Result<WorkflowGraph, GraphValidationError> {
    WorkflowBuilder::new()
        .add_executor("Intake", forward(Ok))
        .add_executor(
            "Validator",
            FnExecutor::new(|_| Err(WeaveError::handler("input rejected by validator"))),
        )
        .add_executor("Done", output(Ok))
        .set_start("Intake")
        .add_edge("Intake", "Validator")
        .add_edge("Validator", "Done")
        .build()
}

const MAX_RETRIES: u64 = 3;
const MIN_LEN: usize = 5;

fn retry() -> std::result::Result<WorkflowGraph, GraphValidationError> {
    WorkflowBuilder::new()
        .add_executor(
            "Prepare",
            forward(|p| Ok(json!({ "text": as_text(&p)?, "attempts": 0 }))),
        )
        .add_executor(
            "Validate",
            router(|p| {
                let text = p["text"].as_str().unwrap_or_default();
                let attempts = p["attempts"].as_u64().unwrap_or_default();
                let label = if text.chars().count() >= MIN_LEN {
                    "ok"
                } else if attempts < MAX_RETRIES {
                    "retry"
                } else {
                    "failed"
                };
                Ok(label.to_string())
            }),
        )
        .add_executor(
            "Revise",
            forward(|mut p| {
                let attempts = p["attempts"].as_u64().unwrap_or_default() + 1;
                p["attempts"] = json!(attempts);
                Ok(p)
            }),
        )
        .add_executor("Accept", output(|p| {
            Ok(json!(format!("accepted: {}", p["text"].as_str().unwrap_or_default())))
        }))
        .add_executor(
            "Reject",
            output(|p| {
                Ok(json!(format!(
                    "rejected after {} attempts: {}",
                    p["attempts"],
                    p["text"].as_str().unwrap_or_default()
                )))
            }),
        )
        .set_start("Prepare")
        .add_edge("Prepare", "Validate")
        .add_conditional(
            "Validate",
            [("ok", "Accept"), ("retry", "Revise"), ("failed", "Reject")],
        )
        .add_edge("Revise", "Validate")
        .build()
}

/// Deterministic stand-in for a planning model.
struct LocalPlanner {
    name: &'static str,
}

impl Agent for LocalPlanner {
    fn name(&self) -> &str {
        self.name
    }

    fn run(&self, prompt: String) -> BoxFuture<'_, Result<String>> {
        Box::pin(async move {
            let lines: Vec<&str> = prompt.lines().filter(|l| !l.trim().is_empty()).collect();
            Ok(format!(
                "[{}] {} line(s) considered; first: {}",
                self.name,
                lines.len(),
                lines.first().copied().unwrap_or_default()
            ))
        })
    }
}

fn planner(name: &'static str) -> Arc<dyn Agent> {
    Arc::new(LocalPlanner { name })
}

fn travel_planner() -> std::result::Result<WorkflowGraph, GraphValidationError> {
    WorkflowBuilder::new()
        .add_executor("Trip", forward(Ok))
        .add_executor(
            "Hotels",
            AgentExecutor::new(planner("hotels")).with_template("Suggest hotels in {input}."),
        )
        .add_executor(
            "Restaurants",
            AgentExecutor::new(planner("restaurants")).with_template("Suggest restaurants in {input}."),
        )
        .add_executor(
            "Sights",
            AgentExecutor::new(planner("sights")).with_template("Suggest sights in {input}."),
        )
        .add_executor(
            "Itinerary",
            AgentExecutor::new(planner("itinerary"))
                .with_template("Combine these suggestions into one itinerary:\n\n{input}")
                .yielding(),
        )
        .set_start("Trip")
        .add_fan_out("Trip", ["Hotels", "Restaurants", "Sights"])
        .add_fan_in(["Hotels", "Restaurants", "Sights"], "Itinerary")
        .build()
}

/// Parse CLI words as JSON when possible, otherwise as one string.
pub fn parse_input(words: &[String]) -> Option<Value> {
    if words.is_empty() {
        return None;
    }
    let text = words.join(" ");
    Some(serde_json::from_str(&text).unwrap_or(Value::String(text)))
}
