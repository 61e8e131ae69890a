//! Two-pass assembly of instruction streams into [`Program`]s.
//!
//! Jump instructions are emitted against [`Label`] handles. Assembly first fixes every label to
//! the index of the instruction it marks, then bakes those indices into the jump operands, so
//! nothing at run time consults a label table. Method names are bound to `&'static MethodSpec`
//! entries in the program's method table at the same time.
use crate::error::AssembleError;
use crate::instruction::Instruction;
use crate::methods::{MethodRegistry, MethodSpec};
use ahash::AHashMap;
use std::fmt;
use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(usize);

/// Jump operand. Refers to a [`Label`] until assembly and to an instruction index afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Target(usize);

impl Target {
    /// Resolved instruction index. Only meaningful inside an assembled [`Program`].
    pub fn index(self) -> usize {
        self.0
    }

    #[cfg(test)]
    pub(crate) fn resolved(index: usize) -> Self {
        Target(index)
    }
}

impl From<Label> for Target {
    fn from(label: Label) -> Self {
        Target(label.0)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// Index into a program's method table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodId {
    index: usize,
    name: &'static str,
}

impl MethodId {
    pub fn index(self) -> usize {
        self.index
    }

    pub fn name(self) -> &'static str {
        self.name
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// An assembled, immutable instruction stream.
#[derive(Debug, Clone)]
pub struct Program {
    instructions: Vec<Instruction>,
    methods: Vec<&'static MethodSpec>,
    labels: AHashMap<String, usize>,
    result_table: String,
}

impl Program {
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Instruction> {
        self.instructions.get(index)
    }

    /// Name of the table returned by a run.
    pub fn result_table(&self) -> &str {
        &self.result_table
    }

    /// Resolved start index of the label called `name`.
    pub fn label_index(&self, name: &str) -> Option<usize> {
        self.labels.get(name).copied()
    }

    pub fn method(&self, id: MethodId) -> &'static MethodSpec {
        self.methods[id.index]
    }

    /// One `IIII MNEMONIC operands` line per instruction.
    pub fn disassemble(&self) -> String {
        let mut out = String::new();
        for (idx, instruction) in self.instructions.iter().enumerate() {
            let _ = writeln!(out, "{idx:04} {instruction}");
        }
        out
    }
}

/// Builds a [`Program`].
#[derive(Debug)]
pub struct Assembler {
    registry: MethodRegistry,
    instructions: Vec<Instruction>,
    label_names: Vec<String>,
    label_ids: AHashMap<String, Label>,
    marks: Vec<Option<usize>>,
    methods: Vec<&'static MethodSpec>,
    method_ids: AHashMap<String, MethodId>,
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Assembler {
    /// Assembler resolving methods against the built-in registry.
    pub fn new() -> Self {
        Self::with_registry(MethodRegistry::builtin())
    }

    pub fn with_registry(registry: MethodRegistry) -> Self {
        Self {
            registry,
            instructions: Vec::new(),
            label_names: Vec::new(),
            label_ids: AHashMap::new(),
            marks: Vec::new(),
            methods: Vec::new(),
            method_ids: AHashMap::new(),
        }
    }

    /// Handle for the label called `name`; the same name always yields the same handle.
    pub fn label(&mut self, name: &str) -> Label {
        if let Some(label) = self.label_ids.get(name) {
            return *label;
        }
        let label = Label(self.label_names.len());
        self.label_names.push(name.to_string());
        self.marks.push(None);
        self.label_ids.insert(name.to_string(), label);
        label
    }

    /// Binds `label` to the next emitted instruction. `label` must come from this assembler.
    pub fn mark(&mut self, label: Label) -> Result<(), AssembleError> {
        let Some(slot) = self.marks.get_mut(label.0) else {
            return Err(AssembleError::UnresolvedLabel(format!("#{}", label.0)));
        };
        if slot.is_some() {
            return Err(AssembleError::DuplicateLabel(
                self.label_names[label.0].clone(),
            ));
        }
        *slot = Some(self.instructions.len());
        Ok(())
    }

    /// Appends `instruction`, returning its index.
    pub fn emit(&mut self, instruction: Instruction) -> usize {
        self.instructions.push(instruction);
        self.instructions.len() - 1
    }

    pub fn extend(&mut self, instructions: impl IntoIterator<Item = Instruction>) {
        self.instructions.extend(instructions);
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Binds `name` to a method table slot.
    pub fn method(&mut self, name: &str) -> Result<MethodId, AssembleError> {
        let spec = self
            .registry
            .get(name)
            .ok_or_else(|| AssembleError::UnknownMethod(name.to_string()))?;
        let key = spec.name.to_ascii_uppercase();
        if let Some(id) = self.method_ids.get(&key) {
            return Ok(*id);
        }
        let id = MethodId {
            index: self.methods.len(),
            name: spec.name,
        };
        self.methods.push(spec);
        self.method_ids.insert(key, id);
        Ok(id)
    }

    pub fn assemble(self, result_table: impl Into<String>) -> Result<Program, AssembleError> {
        let Assembler {
            mut instructions,
            label_names,
            marks,
            methods,
            ..
        } = self;
        let len = instructions.len();

        // Pass 1: label -> instruction index.
        let mut labels = AHashMap::with_capacity(label_names.len());
        for (name, mark) in label_names.iter().zip(&marks) {
            if let Some(index) = mark {
                labels.insert(name.clone(), *index);
            }
        }

        // Pass 2: bake indices into jump operands.
        for (index, instruction) in instructions.iter_mut().enumerate() {
            if let Some(target) = instruction.target_mut() {
                let label = target.0;
                let resolved = marks
                    .get(label)
                    .copied()
                    .flatten()
                    .ok_or_else(|| {
                        AssembleError::UnresolvedLabel(
                            label_names
                                .get(label)
                                .cloned()
                                .unwrap_or_else(|| format!("#{label}")),
                        )
                    })?;
                check_in_range(index, resolved as i64, len)?;
                *target = Target(resolved);
            }
        }

        validate(&instructions, &methods)?;

        Ok(Program {
            instructions,
            methods,
            labels,
            result_table: result_table.into(),
        })
    }
}

fn check_in_range(index: usize, target: i64, len: usize) -> Result<(), AssembleError> {
    if target < 0 || target as usize >= len {
        return Err(AssembleError::TargetOutOfRange { index, target, len });
    }
    Ok(())
}

/// Checks literal jumps and `PrepareMethodCall`/`Call` pairing.
fn validate(
    instructions: &[Instruction],
    methods: &[&'static MethodSpec],
) -> Result<(), AssembleError> {
    let len = instructions.len();
    let mut pending: Vec<(MethodId, usize)> = Vec::new();

    let check_method = |id: MethodId| match methods.get(id.index) {
        Some(spec) if spec.name == id.name => Ok(*spec),
        _ => Err(AssembleError::UnknownMethod(id.name.to_string())),
    };

    for (index, instruction) in instructions.iter().enumerate() {
        match instruction {
            Instruction::GoTo { index: target } => {
                check_in_range(index, i64::try_from(*target).unwrap_or(i64::MAX), len)?;
            }
            Instruction::Skip { offset } | Instruction::SkipState { offset, .. } => {
                let Some(target) = (index as i64).checked_add(*offset) else {
                    return Err(AssembleError::TargetOutOfRange {
                        index,
                        target: *offset,
                        len,
                    });
                };
                check_in_range(index, target, len)?;
            }
            Instruction::PrepareMethodCall { method } => {
                check_method(*method)?;
                pending.push((*method, index));
            }
            Instruction::Call { method, arg_count } => {
                let spec = check_method(*method)?;
                match pending.pop() {
                    Some((prepared, _)) if prepared == *method => {}
                    _ => {
                        return Err(AssembleError::UnpreparedCall {
                            method: method.name.to_string(),
                            index,
                        })
                    }
                }
                if *arg_count != spec.params.len() {
                    return Err(AssembleError::ArgumentCountMismatch {
                        method: method.name.to_string(),
                        expected: spec.params.len(),
                        actual: *arg_count,
                    });
                }
            }
            _ => {}
        }
    }

    if let Some((method, index)) = pending.pop() {
        return Err(AssembleError::UncalledPrepare {
            method: method.name.to_string(),
            index,
        });
    }
    Ok(())
}
