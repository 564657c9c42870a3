//! Minimal native standard library.
//!
//! Installed into an evaluator's root scope at construction: `print`,
//! `assert`, `len`, `now`. The core stays fully functional when a program
//! uses none of them; anything richer belongs to external collaborators.

use crate::env::Environment;
use crate::error::{EvalResult, RuntimeError};
use crate::evaluator::Evaluator;
use crate::value::{Callable, NativeFn, NativeValue, Value};
use std::rc::Rc;

/// Register the prelude natives into `env`.
pub(crate) fn install(env: &Environment) {
    define(env, "print", native_print);
    define(env, "assert", native_assert);
    define(env, "len", native_len);
    define(env, "now", native_now);
}

pub(crate) fn define(env: &Environment, name: &'static str, func: NativeFn) {
    env.define_function(name, Callable::Native(Rc::new(NativeValue { name, func })));
}

/// `print(a, b, ...)`: joins arguments with spaces into the evaluator's
/// captured output buffer.
fn native_print(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult<Value> {
    let line = args
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    eval.capture_print(line);
    Ok(Value::Null)
}

/// `assert(cond)` / `assert(cond, message)`.
fn native_assert(_eval: &mut Evaluator, args: Vec<Value>) -> EvalResult<Value> {
    let cond = args.first().cloned().unwrap_or(Value::Null);
    if cond.is_truthy() {
        Ok(Value::Null)
    } else {
        let message = match args.get(1) {
            Some(v) => v.to_string(),
            None => "assertion failed".to_string(),
        };
        Err(RuntimeError::AssertionFailed(message))
    }
}

/// `len(sequence | string | record)`.
fn native_len(_eval: &mut Evaluator, args: Vec<Value>) -> EvalResult<Value> {
    match args.first() {
        Some(Value::Sequence(items)) => Ok(Value::Number(items.len() as f64)),
        Some(Value::Str(s)) => Ok(Value::Number(s.chars().count() as f64)),
        Some(Value::Record(fields)) => Ok(Value::Number(fields.len() as f64)),
        Some(other) => Err(RuntimeError::TypeMismatch(format!(
            "len requires a sequence, string, or record, got {}",
            other.type_name()
        ))),
        None => Err(RuntimeError::TypeMismatch(
            "len requires an argument".to_string(),
        )),
    }
}

/// `now()`: wall-clock milliseconds.
fn native_now(_eval: &mut Evaluator, _args: Vec<Value>) -> EvalResult<Value> {
    Ok(Value::Number(crate::evaluator::now_millis() as f64))
}
