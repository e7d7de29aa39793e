use crate::Response;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

type Predicate = dyn Fn(&Response) -> bool + Send + Sync;

/// A named assertion evaluated against every response.
#[derive(Clone)]
pub struct Check {
    name: Arc<str>,
    predicate: Arc<Predicate>,
}

impl Check {
    pub fn new<F>(name: &str, predicate: F) -> Self
    where
        F: Fn(&Response) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            predicate: Arc::new(predicate),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn evaluate(&self, response: &Response) -> CheckResult {
        CheckResult {
            name: self.name.clone(),
            passed: (self.predicate)(response),
        }
    }

    /// The result recorded when no response was received at all.
    pub fn failed(&self) -> CheckResult {
        CheckResult {
            name: self.name.clone(),
            passed: false,
        }
    }
}

impl fmt::Debug for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Check").field("name", &self.name).finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub name: Arc<str>,
    pub passed: bool,
}

/// Declarative form of a [`Check`], as found in run configuration files.
///
/// ```json
/// { "name": "success login", "kind": "status", "equals": 200 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckSpec {
    pub name: String,
    #[serde(flatten)]
    pub kind: CheckKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CheckKind {
    /// Status code equals the given value.
    Status { equals: u16 },
    /// Status code in the inclusive range.
    StatusIn { min: u16, max: u16 },
    /// Any 2xx status.
    Success,
    /// Response body contains the given text.
    BodyContains { text: String },
}

impl CheckSpec {
    pub fn status(name: &str, equals: u16) -> Self {
        Self {
            name: name.to_string(),
            kind: CheckKind::Status { equals },
        }
    }
}

impl From<&CheckSpec> for Check {
    fn from(spec: &CheckSpec) -> Self {
        match spec.kind.clone() {
            CheckKind::Status { equals } => Check::new(&spec.name, move |r| r.status == equals),
            CheckKind::StatusIn { min, max } => {
                Check::new(&spec.name, move |r| (min..=max).contains(&r.status))
            }
            CheckKind::Success => Check::new(&spec.name, Response::is_success),
            CheckKind::BodyContains { text } => Check::new(&spec.name, move |r| {
                String::from_utf8_lossy(&r.body).contains(text.as_str())
            }),
        }
    }
}
