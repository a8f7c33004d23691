//! The iteration protocol and generator resumption.

use super::VM;
use super::interpreter::{Exit, Injected};
use crate::error::{Error, Result, type_error};
use crate::gc::ObjectRef;
use crate::runtime::function::{GeneratorState, ResumeMode};
use crate::runtime::object::{ObjectKind, PropertyKey};
use crate::runtime::value::Value;
use crate::compiler::OpCode;

impl VM {
    /// GetIterator: calls `value[Symbol.iterator]()` and returns the
    /// iterator with its `next` method.
    pub fn get_iterator(&mut self, value: &Value) -> Result<(Value, Value)> {
        let key = PropertyKey::Symbol(self.realm.symbols.iterator.clone());
        let Some(method) = self.get_method(value, &key)? else {
            return type_error(format!("{} is not iterable", self.describe(value)));
        };
        let iterator = self.call(&method, value, &[])?;
        if !iterator.is_object() {
            return type_error("Result of the Symbol.iterator method is not an object");
        }
        let next = self.get_named(&iterator, "next")?;
        Ok((iterator, next))
    }

    /// IteratorStep: the next value, or `None` once the iterator is done.
    pub fn iterator_step(&mut self, iterator: &Value, next: &Value) -> Result<Option<Value>> {
        let result = self.call(next, iterator, &[])?;
        if !result.is_object() {
            return type_error(format!("Iterator result {} is not an object", self.describe(&result)));
        }
        if self.get_named(&result, "done")?.to_boolean() {
            return Ok(None);
        }
        Ok(Some(self.get_named(&result, "value")?))
    }

    /// IteratorClose for a normal completion: calls `return` if present and
    /// checks its result.
    pub fn iterator_close(&mut self, iterator: &Value) -> Result<()> {
        let Some(method) = self.get_method(iterator, &PropertyKey::from("return"))? else {
            return Ok(());
        };
        let result = self.call(&method, iterator, &[])?;
        if !result.is_object() {
            return type_error("Iterator result is not an object");
        }
        Ok(())
    }

    /// IteratorClose while an exception is propagating: errors raised by
    /// `return` are dropped in favor of the original one.
    pub fn iterator_close_quietly(&mut self, iterator: &Value) -> Result<()> {
        match self.iterator_close(iterator) {
            Err(error) if !error.is_catchable() => Err(error),
            _ => Ok(()),
        }
    }

    /// Drains an iterable into a vector.
    pub fn iterate_to_vec(&mut self, iterable: &Value) -> Result<Vec<Value>> {
        let (iterator, next) = self.get_iterator(iterable)?;
        let mut values = Vec::new();
        while let Some(value) = self.iterator_step(&iterator, &next)? {
            values.push(value);
        }
        Ok(values)
    }

    /// Resumes a generator with `next`, `throw` or `return`.
    pub fn generator_resume(&mut self, generator: &Value, mode: ResumeMode, value: Value) -> Result<Value> {
        let object = match generator {
            Value::Object(object) if matches!(self.heap.object(*object)?.kind, ObjectKind::Generator(_)) => *object,
            _ => return type_error("next method called on incompatible receiver"),
        };
        if self.native_depth >= self.config.max_native_depth {
            return Err(Error::StackOverflow);
        }
        let state = self.generator_data(object)?.state;
        match state {
            GeneratorState::Running => return type_error("Generator is already running"),
            GeneratorState::Completed => return self.completed_generator(mode, value),
            GeneratorState::SuspendedStart if mode != ResumeMode::Next => {
                let data = self.generator_data(object)?;
                data.state = GeneratorState::Completed;
                data.frame = None;
                return self.completed_generator(mode, value);
            }
            _ => {}
        }

        let data = self.generator_data(object)?;
        let Some(mut frame) = data.frame.take() else {
            return Err(Error::InternalError("suspended generator without a frame".into()));
        };
        data.state = GeneratorState::Running;

        let mut injected = None;
        if state == GeneratorState::SuspendedYield {
            let suspended_at = frame
                .code
                .bytecode
                .instructions
                .get(frame.ip.saturating_sub(1))
                .map(|instruction| instruction.opcode);
            if suspended_at == Some(OpCode::YieldRaw) {
                frame.stack.push(value);
                frame.resume_mode = mode;
            } else {
                match mode {
                    ResumeMode::Next => frame.stack.push(value),
                    ResumeMode::Throw => injected = Some(Injected::Throw(value)),
                    ResumeMode::Return => injected = Some(Injected::Return(value)),
                }
            }
        }

        let outcome = self.reenter(|vm| vm.execute(*frame, injected));
        match outcome {
            Ok(Exit::Yield(result)) => Ok(result),
            Ok(Exit::Return(result)) => {
                self.finish_generator(object)?;
                Ok(self.iter_result(result, true))
            }
            Err(error) => {
                self.finish_generator(object)?;
                Err(error)
            }
        }
    }

    fn generator_data(&mut self, object: ObjectRef) -> Result<&mut crate::runtime::function::GeneratorData> {
        match &mut self.heap.object_mut(object)?.kind {
            ObjectKind::Generator(data) => Ok(data),
            _ => type_error("next method called on incompatible receiver"),
        }
    }

    fn finish_generator(&mut self, object: ObjectRef) -> Result<()> {
        let data = self.generator_data(object)?;
        data.state = GeneratorState::Completed;
        data.frame = None;
        Ok(())
    }

    fn completed_generator(&mut self, mode: ResumeMode, value: Value) -> Result<Value> {
        match mode {
            ResumeMode::Next => Ok(self.iter_result(Value::Undefined, true)),
            ResumeMode::Return => Ok(self.iter_result(value, true)),
            ResumeMode::Throw => Err(Error::Thrown(value)),
        }
    }
}
