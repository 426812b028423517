// Tree-walking interpreter over a parsed Program
mod builtins;
mod error;
mod eval;
mod exec;
pub mod heap;

pub use error::RuntimeError;
pub use heap::{Heap, Ptr};

use eval::Location;

use std::collections::{BTreeSet, HashMap};
use std::fmt::Write as _;
use std::io::{self, BufRead, Write};

use crate::limits::Limits;
use crate::program::{Program, Type};

/// A bound name: ints hold their value, everything else a cell handle
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub ty: Type,
    pub value: i32,
}

type Frame = HashMap<String, Variable>;

pub struct Runtime<'p, R: BufRead, W: Write> {
    program: &'p Program,
    limits: Limits,
    heap: Heap<'p>,
    globals: Frame,
    frames: Vec<Frame>,
    istack: Vec<i32>,
    sstack: Vec<String>,
    steps: u64,
    input: R,
    output: W,
}

impl<'p> Runtime<'p, io::StdinLock<'static>, io::Stdout> {
    /// Runtime reading standard input and writing standard output
    pub fn new(program: &'p Program) -> Self {
        Self::with_io(program, io::stdin().lock(), io::stdout())
    }
}

impl<'p, R: BufRead, W: Write> Runtime<'p, R, W> {
    pub fn with_io(program: &'p Program, input: R, output: W) -> Self {
        let limits = Limits::default();
        Self {
            program,
            heap: Heap::new(program, limits.max_heap_cells),
            limits,
            globals: Frame::new(),
            frames: Vec::new(),
            istack: Vec::new(),
            sstack: Vec::new(),
            steps: 0,
            input,
            output,
        }
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.heap = Heap::new(self.program, limits.max_heap_cells);
        self.limits = limits;
        self
    }

    /// Initialise globals in declaration order, then call `main()`.
    /// Returns main's return value. State from a previous run is discarded.
    pub fn run(&mut self) -> Result<i32, RuntimeError> {
        self.reset();
        let program = self.program;
        log::debug!("initialising {} globals", program.globals.len());

        for dim in &program.globals {
            let value = self.heap.make(&dim.ty)?;
            self.globals.insert(
                dim.name.clone(),
                Variable {
                    ty: dim.ty.clone(),
                    value,
                },
            );
            if let Some(init) = dim.init {
                let value = self.eval_value(init)?;
                self.store(Location::Global(&dim.name), value)?;
            }
        }

        let main = program
            .find_function("main")
            .ok_or_else(|| RuntimeError::MissingFunction("main".to_string()))?;
        if !program.functions[main].args.is_empty() {
            return Err(RuntimeError::InvalidEntryPoint("main".to_string()));
        }

        let result = self.call_function(main, &[])?;
        self.output.flush()?;
        log::debug!(
            "main returned {} after {} steps, {} live cells",
            result,
            self.steps,
            self.heap.live()
        );
        Ok(result)
    }

    fn reset(&mut self) {
        self.heap = Heap::new(self.program, self.limits.max_heap_cells);
        self.globals.clear();
        self.frames.clear();
        self.istack.clear();
        self.sstack.clear();
        self.steps = 0;
    }

    /// Count one executed statement against the step budget
    fn tick(&mut self) -> Result<(), RuntimeError> {
        self.steps += 1;
        if self.limits.max_steps != 0 && self.steps > self.limits.max_steps {
            return Err(RuntimeError::StepLimitExceeded(self.limits.max_steps));
        }
        Ok(())
    }

    pub fn live_cells(&self) -> usize {
        self.heap.live()
    }

    /// Cells reachable from global variables through owning slots
    pub fn reachable_from_globals(&self) -> Result<usize, RuntimeError> {
        let mut seen = BTreeSet::new();
        let mut pending: Vec<Ptr> = self
            .globals
            .values()
            .filter(|v| v.ty.is_heap())
            .map(|v| v.value)
            .collect();

        while let Some(ptr) = pending.pop() {
            if seen.insert(ptr) {
                pending.extend(self.heap.children(ptr)?);
            }
        }
        Ok(seen.len())
    }

    pub fn global(&self, name: &str) -> Option<&Variable> {
        self.globals.get(name)
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Render globals, heap cells and stack depths for diagnostics
    pub fn state_summary(&self) -> String {
        let mut out = String::new();
        let program = self.program;

        let _ = writeln!(out, "globals:");
        let mut names: Vec<&String> = self.globals.keys().collect();
        names.sort();
        for name in names {
            let var = &self.globals[name];
            let _ = writeln!(
                out,
                "  {} {} = {}",
                name,
                program.type_name(&var.ty),
                var.value
            );
        }

        let _ = writeln!(out, "heap: {} cells", self.heap.live());
        for (ptr, page) in self.heap.iter() {
            let _ = match &page.data {
                heap::PageData::Text(s) => {
                    writeln!(out, "  {} {} {:?}", ptr, program.type_name(&page.ty), s)
                }
                heap::PageData::Slots(slots) => {
                    writeln!(out, "  {} {} {:?}", ptr, program.type_name(&page.ty), slots)
                }
            };
        }

        let _ = writeln!(
            out,
            "frames: {}, int stack: {}, string stack: {}",
            self.frames.len(),
            self.istack.len(),
            self.sstack.len()
        );
        out
    }

    pub fn into_output(self) -> W {
        self.output
    }
}
