use super::HookValue;
use anyhow::{anyhow, bail};
use serde_json::{Map, Number, Value};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// How the results of a hook's callbacks are folded into one value.
///
/// | reducer  | seed            | step                                   |
/// |----------|-----------------|----------------------------------------|
/// | `none`   | null            | result ignored                         |
/// | `pass`   | first argument  | result replaces the running value      |
/// | `or`     | `false`         | running ∨ truthy(result)               |
/// | `and`    | `true`          | running ∧ truthy(result)               |
/// | `mult`   | `1`             | running × result                       |
/// | `add`    | `0`             | running + result                       |
/// | `append` | `""`            | running + result as text               |
/// | `push`   | `[]`            | result appended as one element         |
/// | `concat` | `[]`            | result array spliced in                |
/// | `set`    | `{}`            | `result → true`                        |
/// | `insert` | `[]`            | result appended unless already present |
/// | `assign` | `{}`            | result object merged, later wins       |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, AsRefStr, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum Reducer {
    None,
    Pass,
    Or,
    And,
    Mult,
    Add,
    Append,
    Push,
    Concat,
    Set,
    Insert,
    Assign,
}

impl Reducer {
    pub fn seed(self, args: &[HookValue]) -> HookValue {
        match self {
            Self::None => HookValue::null(),
            Self::Pass => args.first().cloned().unwrap_or_else(HookValue::null),
            Self::Or => HookValue::from(false),
            Self::And => HookValue::from(true),
            Self::Mult => HookValue::data(1),
            Self::Add => HookValue::data(0),
            Self::Append => HookValue::data(""),
            Self::Push | Self::Concat | Self::Insert => HookValue::Data(Value::Array(Vec::new())),
            Self::Set | Self::Assign => HookValue::Data(Value::Object(Map::new())),
        }
    }

    /// Fold one callback result into the running value.
    pub fn step(self, acc: HookValue, next: HookValue) -> anyhow::Result<HookValue> {
        match self {
            Self::None => Ok(HookValue::null()),
            Self::Pass => Ok(next),
            Self::Or => Ok(HookValue::from(acc.is_truthy() || next.is_truthy())),
            Self::And => Ok(HookValue::from(acc.is_truthy() && next.is_truthy())),
            Self::Mult | Self::Add => {
                let (acc, next) = (self.number(&acc)?, self.number(&next)?);
                arithmetic(self, acc, next).map(HookValue::Data)
            }
            Self::Append => {
                let mut text = match acc {
                    HookValue::Data(Value::String(s)) => s,
                    _ => bail!("append: running value is not a string"),
                };
                match next.into_data() {
                    Some(Value::String(s)) => text.push_str(&s),
                    Some(Value::Number(n)) => text.push_str(&n.to_string()),
                    Some(Value::Bool(b)) => text.push_str(&b.to_string()),
                    _ => bail!("append: callback returned a non-textual value"),
                }
                Ok(HookValue::data(text))
            }
            Self::Push | Self::Concat | Self::Insert => {
                let mut items = match acc {
                    HookValue::Data(Value::Array(items)) => items,
                    _ => bail!("{}: running value is not an array", self),
                };
                let next = next
                    .into_data()
                    .ok_or_else(|| anyhow!("{}: callback returned a non-data value", self))?;
                match (self, next) {
                    (Self::Concat, Value::Array(more)) => items.extend(more),
                    (Self::Insert, value) => {
                        if !items.contains(&value) {
                            items.push(value);
                        }
                    }
                    (_, value) => items.push(value),
                }
                Ok(HookValue::Data(Value::Array(items)))
            }
            Self::Set => {
                let mut keys = self.object(acc)?;
                let key = match next.into_data() {
                    Some(Value::String(s)) => s,
                    Some(Value::Number(n)) => n.to_string(),
                    Some(Value::Bool(b)) => b.to_string(),
                    _ => bail!("set: callback returned a value that cannot be a key"),
                };
                keys.insert(key, Value::Bool(true));
                Ok(HookValue::Data(Value::Object(keys)))
            }
            Self::Assign => {
                let mut merged = self.object(acc)?;
                match next.into_data() {
                    Some(Value::Null) => {}
                    Some(Value::Object(fields)) => merged.extend(fields),
                    _ => bail!("assign: callback returned a non-object value"),
                }
                Ok(HookValue::Data(Value::Object(merged)))
            }
        }
    }

    fn number(self, value: &HookValue) -> anyhow::Result<Number> {
        match value.as_data() {
            Some(Value::Number(n)) => Ok(n.clone()),
            _ => bail!("{}: expected a numeric value", self),
        }
    }

    fn object(self, value: HookValue) -> anyhow::Result<Map<String, Value>> {
        match value {
            HookValue::Data(Value::Object(map)) => Ok(map),
            _ => bail!("{}: running value is not an object", self),
        }
    }
}

fn arithmetic(reducer: Reducer, acc: Number, next: Number) -> anyhow::Result<Value> {
    if let (Some(a), Some(b)) = (acc.as_i64(), next.as_i64()) {
        let exact = match reducer {
            Reducer::Mult => a.checked_mul(b),
            _ => a.checked_add(b),
        };
        if let Some(result) = exact {
            return Ok(Value::from(result));
        }
    }
    let (a, b) = (
        acc.as_f64().unwrap_or(f64::NAN),
        next.as_f64().unwrap_or(f64::NAN),
    );
    let result = match reducer {
        Reducer::Mult => a * b,
        _ => a + b,
    };
    Number::from_f64(result)
        .map(Value::Number)
        .ok_or_else(|| anyhow!("{}: result is not a finite number", reducer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use strum::IntoEnumIterator;

    fn fold(reducer: Reducer, args: &[HookValue], results: Vec<HookValue>) -> HookValue {
        results
            .into_iter()
            .try_fold(reducer.seed(args), |acc, next| reducer.step(acc, next))
            .unwrap()
    }

    #[test]
    fn test_reducer_names_round_trip() {
        for reducer in Reducer::iter() {
            assert_eq!(reducer.as_ref().parse::<Reducer>().unwrap(), reducer);
        }
        assert_eq!("assign".parse::<Reducer>().unwrap(), Reducer::Assign);
        assert!("merge".parse::<Reducer>().is_err());
    }

    #[test]
    fn test_none_discards_results() {
        let result = fold(Reducer::None, &[], vec![HookValue::data(5)]);
        assert!(result.is_null());
    }

    #[test]
    fn test_pass_seeds_with_first_argument() {
        let args = [HookValue::data("original"), HookValue::data("other")];
        assert_eq!(fold(Reducer::Pass, &args, vec![]), json!("original"));
        assert_eq!(
            fold(Reducer::Pass, &args, vec![HookValue::data("a"), HookValue::data("b")]),
            json!("b")
        );
    }

    #[test]
    fn test_boolean_folds() {
        let results = || vec![HookValue::from(false), HookValue::from(true)];
        assert_eq!(fold(Reducer::And, &[], results()), json!(false));
        assert_eq!(fold(Reducer::Or, &[], results()), json!(true));
        assert_eq!(fold(Reducer::And, &[], vec![]), json!(true));
        assert_eq!(fold(Reducer::Or, &[], vec![]), json!(false));
    }

    #[test]
    fn test_numeric_folds() {
        let results = || vec![HookValue::data(3), HookValue::data(4)];
        assert_eq!(fold(Reducer::Add, &[], results()), json!(7));
        assert_eq!(fold(Reducer::Mult, &[], results()), json!(12));
        assert_eq!(
            fold(Reducer::Add, &[], vec![HookValue::data(1), HookValue::data(0.5)]),
            json!(1.5)
        );
        assert!(Reducer::Add.step(HookValue::data(0), HookValue::data("x")).is_err());
    }

    #[test]
    fn test_append_concatenates_text() {
        let results = vec![HookValue::data("a"), HookValue::data(1), HookValue::data("b")];
        assert_eq!(fold(Reducer::Append, &[], results), json!("a1b"));
    }

    #[test]
    fn test_push_and_concat() {
        let results = || vec![HookValue::data(json!([1, 2])), HookValue::data(3)];
        assert_eq!(fold(Reducer::Push, &[], results()), json!([[1, 2], 3]));
        assert_eq!(fold(Reducer::Concat, &[], results()), json!([1, 2, 3]));
    }

    #[test]
    fn test_set_and_insert() {
        let results = || {
            vec![
                HookValue::data("x"),
                HookValue::data("y"),
                HookValue::data("x"),
            ]
        };
        assert_eq!(
            fold(Reducer::Set, &[], results()),
            json!({ "x": true, "y": true })
        );
        assert_eq!(fold(Reducer::Insert, &[], results()), json!(["x", "y"]));
    }

    #[test]
    fn test_assign_merges_later_wins() {
        let results = vec![
            HookValue::data(json!({ "a": 1, "c": 1 })),
            HookValue::null(),
            HookValue::data(json!({ "b": 2, "c": 3 })),
        ];
        assert_eq!(
            fold(Reducer::Assign, &[], results),
            json!({ "a": 1, "b": 2, "c": 3 })
        );
    }

    #[test]
    fn test_non_data_results_only_pass() {
        let outcome = HookValue::Outcome(Ok(()));
        assert!(Reducer::Push.step(Reducer::Push.seed(&[]), outcome.clone()).is_err());
        assert!(Reducer::Pass.step(HookValue::null(), outcome).is_ok());
    }
}
