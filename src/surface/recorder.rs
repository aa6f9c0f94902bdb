//! A GPU-free [`Surface`] for exercising effect instances.  Only built for tests, or with the
//! `testing` feature.

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use super::{Footprint, Surface};
use crate::error::{CrtError, CrtResult};

/// Every call a [`Recorder`] can receive
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateShader(u32),
    CreateOutput(u32),
    BindInput(Option<u32>),
    Upload(Vec<u8>),
    Draw(Footprint),
    ReleaseOutput(u32),
    ReleaseShader(u32),
}

/// A [`Surface`] which doesn't touch the GPU, and instead keeps a log of every call made to it.
/// Handles are plain integers.  Clones share the same log and failure switches, so a clone can be
/// kept to inspect (or sabotage) an instance after the original was moved into it.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    log: Rc<RefCell<Vec<Call>>>,
    next_handle: Rc<RefCell<u32>>,
    failures: Rc<Cell<Failures>>,
}

/// Which [`Recorder`] operations should fail
#[derive(Debug, Clone, Copy, Default)]
pub struct Failures {
    pub create_shader: bool,
    pub create_output: bool,
    pub upload: bool,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(failures: Failures) -> Self {
        let recorder = Self::default();
        recorder.set_failures(failures);
        recorder
    }

    pub fn set_failures(&self, failures: Failures) {
        self.failures.set(failures);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.log.borrow().clone()
    }

    /// The contents of every constant buffer uploaded so far, in order
    pub fn uploads(&self) -> Vec<Vec<u8>> {
        self.log
            .borrow()
            .iter()
            .filter_map(|c| match c {
                Call::Upload(bytes) => Some(bytes.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.log.borrow().iter().filter(|c| pred(*c)).count()
    }

    fn record(&self, call: Call) {
        self.log.borrow_mut().push(call);
    }

    fn handle(&self) -> u32 {
        let mut next = self.next_handle.borrow_mut();
        *next += 1;
        *next
    }
}

impl Surface for Recorder {
    type Shader = u32;
    type Image = u32;
    type Output = u32;

    fn create_shader(&mut self, label: &str, source: &str) -> CrtResult<u32> {
        if self.failures.get().create_shader {
            return Err(CrtError::surface(format!("{} shader rejected", label)));
        }
        debug_assert!(!source.is_empty());
        let handle = self.handle();
        self.record(Call::CreateShader(handle));
        Ok(handle)
    }

    fn create_output(&mut self, label: &str, _shader: &u32) -> CrtResult<u32> {
        if self.failures.get().create_output {
            return Err(CrtError::surface(format!("no memory for {} output", label)));
        }
        let handle = self.handle();
        self.record(Call::CreateOutput(handle));
        Ok(handle)
    }

    fn bind_input(&mut self, _shader: &mut u32, input: Option<&u32>) {
        self.record(Call::BindInput(input.copied()));
    }

    fn upload_constants(&mut self, _shader: &u32, constants: &[u8]) -> CrtResult<()> {
        if self.failures.get().upload {
            return Err(CrtError::surface("upload failed"));
        }
        self.record(Call::Upload(constants.to_vec()));
        Ok(())
    }

    fn draw(&mut self, _shader: &u32, _output: &mut u32, footprint: Footprint) -> CrtResult<()> {
        self.record(Call::Draw(footprint));
        Ok(())
    }

    fn release_output(&mut self, output: u32) {
        self.record(Call::ReleaseOutput(output));
    }

    fn release_shader(&mut self, shader: u32) {
        self.record(Call::ReleaseShader(shader));
    }
}
