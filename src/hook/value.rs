use crate::error::KernelError;
use crate::module::LifecycleMethod;
use serde_json::Value;

/// A value flowing through a hook: hook arguments and the running result.
#[derive(Debug, Clone)]
pub enum HookValue {
    /// Plain data; `Null` stands for "no value"
    Data(Value),
    /// A lifecycle method about to be called
    Method(LifecycleMethod),
    /// The settled result of a lifecycle method
    Outcome(Result<(), KernelError>),
}

impl HookValue {
    pub fn null() -> Self {
        Self::Data(Value::Null)
    }

    pub fn data(value: impl Into<Value>) -> Self {
        Self::Data(value.into())
    }

    pub fn as_data(&self) -> Option<&Value> {
        match self {
            Self::Data(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_data(self) -> Option<Value> {
        match self {
            Self::Data(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_data().and_then(Value::as_str)
    }

    pub fn into_method(self) -> Option<LifecycleMethod> {
        match self {
            Self::Method(method) => Some(method),
            _ => None,
        }
    }

    pub fn into_outcome(self) -> Option<Result<(), KernelError>> {
        match self {
            Self::Outcome(outcome) => Some(outcome),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Data(Value::Null))
    }

    /// Truthiness used by the `or` and `and` reducers.
    ///
    /// Null, `false`, zero, NaN and the empty string are false; methods,
    /// outcomes, arrays and objects are true.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Data(Value::Null) => false,
            Self::Data(Value::Bool(b)) => *b,
            Self::Data(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
            Self::Data(Value::String(s)) => !s.is_empty(),
            Self::Data(_) | Self::Method(_) | Self::Outcome(_) => true,
        }
    }
}

impl From<Value> for HookValue {
    fn from(value: Value) -> Self {
        Self::Data(value)
    }
}

impl From<&str> for HookValue {
    fn from(value: &str) -> Self {
        Self::Data(Value::String(value.to_string()))
    }
}

impl From<String> for HookValue {
    fn from(value: String) -> Self {
        Self::Data(Value::String(value))
    }
}

impl From<bool> for HookValue {
    fn from(value: bool) -> Self {
        Self::Data(Value::Bool(value))
    }
}

impl From<LifecycleMethod> for HookValue {
    fn from(method: LifecycleMethod) -> Self {
        Self::Method(method)
    }
}

impl PartialEq<Value> for HookValue {
    fn eq(&self, other: &Value) -> bool {
        self.as_data() == Some(other)
    }
}
