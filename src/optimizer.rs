//! The `Unused` pass: removes functions, native bindings, and globals that
//! nothing reachable from an exported set references, then rewrites every
//! surviving instruction's `arg0` to the post-compaction index.
//!
//! Three phases, run in order: mark (worklist over reachable functions,
//! plus anything explicitly exported), compact (move survivors down,
//! recording an old→new remap with `INVALID_INDEX` for removed entries),
//! remap (rewrite `arg0` on every surviving instruction). A remap miss
//! during the third phase means the mark phase under-marked something,
//! which is a bug in this pass, not a condition a caller can hit.

use crate::list::ValueList;
use crate::module::{Module, INVALID_INDEX};
use crate::value::Value;

/// Names of functions/natives/globals to keep even if nothing in the module
/// calls them, typically a host's public entry points.
#[derive(Debug, Clone, Copy, Default)]
pub struct Exports<'a> {
    pub functions: &'a [&'a str],
    pub natives: &'a [&'a str],
    pub globals: &'a [&'a str],
}

impl<'a> Exports<'a> {
    #[must_use]
    pub fn new(functions: &'a [&'a str], natives: &'a [&'a str], globals: &'a [&'a str]) -> Self {
        Self { functions, natives, globals }
    }
}

/// Runs the `Unused` pass on `module` in place.
pub fn optimize(module: &mut Module, exports: &Exports) {
    let (fn_marked, native_marked, global_marked) = mark(module, exports);
    let fn_remap = compact_functions(module, &fn_marked);
    let native_remap = compact_natives(module, &native_marked);
    let global_remap = compact_globals(module, &global_marked);
    remap(module, &fn_remap, &native_remap, &global_remap);
}

/// Walks a value (recursing into lists) for embedded function/native
/// references, marking their targets live. Globals/constants can hold a
/// `FunctionReference`/`NativeFunctionReference` produced by a `&(name)`
/// lvalue, not just code instructions, so the mark phase has to see into them
/// too or a survivor's stored pointer goes stale across compaction.
fn mark_value_refs(value: &Value, fn_marked: &mut [bool], native_marked: &mut [bool], fn_worklist: &mut Vec<usize>) {
    match value {
        Value::FunctionReference(idx) => {
            let idx = *idx as usize;
            if !fn_marked[idx] {
                fn_marked[idx] = true;
                fn_worklist.push(idx);
            }
        }
        Value::NativeFunctionReference(idx) => native_marked[*idx as usize] = true,
        Value::List(list) => {
            for item in list {
                mark_value_refs(item, fn_marked, native_marked, fn_worklist);
            }
        }
        _ => {}
    }
}

fn mark(module: &Module, exports: &Exports) -> (Vec<bool>, Vec<bool>, Vec<bool>) {
    let mut fn_marked = vec![false; module.functions.len()];
    let mut native_marked = vec![false; module.native_bindings.len()];
    let mut global_marked = vec![false; module.globals.len()];

    let mut worklist = Vec::new();
    for (idx, def) in module.functions.iter().enumerate() {
        if exports.functions.contains(&def.name.as_str()) {
            fn_marked[idx] = true;
            worklist.push(idx);
        }
    }
    for (idx, def) in module.native_bindings.iter().enumerate() {
        if exports.natives.contains(&def.name.as_str()) {
            native_marked[idx] = true;
        }
    }
    for (idx, def) in module.globals.iter().enumerate() {
        if exports.globals.contains(&def.name.as_str()) {
            global_marked[idx] = true;
        }
    }

    // The constant pool is never compacted, so every entry survives
    // unconditionally; anything it points at must stay live too.
    for value in &module.constants {
        mark_value_refs(value, &mut fn_marked, &mut native_marked, &mut worklist);
    }
    for (idx, def) in module.globals.iter().enumerate() {
        if global_marked[idx] {
            mark_value_refs(&def.initial_value, &mut fn_marked, &mut native_marked, &mut worklist);
        }
    }

    while let Some(idx) = worklist.pop() {
        for instr in &module.functions[idx].code {
            let target = instr.arg0 as usize;
            if instr.opcode.references_function() {
                if !fn_marked[target] {
                    fn_marked[target] = true;
                    worklist.push(target);
                }
            } else if instr.opcode.references_native() {
                native_marked[target] = true;
            } else if instr.opcode.references_global() {
                if !global_marked[target] {
                    global_marked[target] = true;
                    mark_value_refs(&module.globals[target].initial_value, &mut fn_marked, &mut native_marked, &mut worklist);
                }
            }
        }
    }
    (fn_marked, native_marked, global_marked)
}

fn compact_functions(module: &mut Module, marked: &[bool]) -> Vec<usize> {
    let mut remap = vec![INVALID_INDEX; marked.len()];
    let mut kept = Vec::with_capacity(marked.len());
    for (old_idx, def) in module.functions.drain(..).enumerate() {
        if marked[old_idx] {
            remap[old_idx] = kept.len();
            kept.push(def);
        }
    }
    module.functions = kept;
    remap
}

fn compact_natives(module: &mut Module, marked: &[bool]) -> Vec<usize> {
    let mut remap = vec![INVALID_INDEX; marked.len()];
    let mut kept_bindings = Vec::with_capacity(marked.len());
    let mut kept_functions = Vec::with_capacity(marked.len());
    let bindings = std::mem::take(&mut module.native_bindings);
    let functions = std::mem::take(&mut module.native_functions);
    for (old_idx, (binding, func)) in bindings.into_iter().zip(functions).enumerate() {
        if marked[old_idx] {
            remap[old_idx] = kept_bindings.len();
            kept_bindings.push(binding);
            kept_functions.push(func);
        }
    }
    module.native_bindings = kept_bindings;
    module.native_functions = kept_functions;
    remap
}

fn compact_globals(module: &mut Module, marked: &[bool]) -> Vec<usize> {
    let mut remap = vec![INVALID_INDEX; marked.len()];
    let mut kept = Vec::with_capacity(marked.len());
    for (old_idx, def) in module.globals.drain(..).enumerate() {
        if marked[old_idx] {
            remap[old_idx] = kept.len();
            kept.push(def);
        }
    }
    module.globals = kept;
    remap
}

/// Rewrites a value's embedded function/native reference(s) to their
/// post-compaction index, recursing into lists. The targets are guaranteed
/// live (hence present in the remap table) because `mark_value_refs` walked
/// this same value during the mark phase.
fn remap_value(value: &mut Value, fn_remap: &[usize], native_remap: &[usize]) {
    match value {
        Value::FunctionReference(idx) => {
            let new_idx = fn_remap[*idx as usize];
            assert_ne!(new_idx, INVALID_INDEX, "optimizer dropped a function still referenced from a constant/global value");
            *idx = new_idx as i64;
        }
        Value::NativeFunctionReference(idx) => {
            let new_idx = native_remap[*idx as usize];
            assert_ne!(new_idx, INVALID_INDEX, "optimizer dropped a native binding still referenced from a constant/global value");
            *idx = new_idx as i64;
        }
        Value::List(list) => {
            *list = list
                .iter()
                .map(|item| {
                    let mut item = item.clone();
                    remap_value(&mut item, fn_remap, native_remap);
                    item
                })
                .collect::<ValueList>();
        }
        _ => {}
    }
}

fn remap(module: &mut Module, fn_remap: &[usize], native_remap: &[usize], global_remap: &[usize]) {
    for def in &mut module.functions {
        for instr in &mut def.code {
            let new_idx = if instr.opcode.references_function() {
                fn_remap[instr.arg0 as usize]
            } else if instr.opcode.references_native() {
                native_remap[instr.arg0 as usize]
            } else if instr.opcode.references_global() {
                global_remap[instr.arg0 as usize]
            } else {
                continue;
            };
            assert_ne!(new_idx, INVALID_INDEX, "optimizer dropped a definition still referenced from surviving code");
            instr.arg0 = new_idx as i64;
        }
    }
    for value in &mut module.constants {
        remap_value(value, fn_remap, native_remap);
    }
    for def in &mut module.globals {
        remap_value(&mut def.initial_value, fn_remap, native_remap);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{FunctionDefinition, GlobalDefinition, Instruction, Opcode};
    use crate::value::Value;

    #[test]
    fn drops_unreferenced_function_and_remaps_survivors() {
        let mut module = Module::new();
        let mut main = FunctionDefinition::new("main", 0, 1, 0, 0);
        main.code = vec![Instruction::new(Opcode::Call, 2), Instruction::bare(Opcode::Return)];
        module.append_function(main);
        module.append_function(FunctionDefinition::new("dead", 0, 0, 0, 0));
        module.append_function(FunctionDefinition::new("helper", 0, 1, 0, 0));

        optimize(&mut module, &Exports::new(&["main"], &[], &[]));

        assert_eq!(module.functions.len(), 2);
        assert_eq!(module.functions[0].name, "main");
        assert_eq!(module.functions[1].name, "helper");
        assert_eq!(module.functions[0].code[0].arg0, 1);
    }

    #[test]
    fn keeps_exported_global_with_no_referencing_function() {
        let mut module = Module::new();
        module.append_function(FunctionDefinition::new("main", 0, 0, 0, 0));
        module.append_global(GlobalDefinition::new("unused_but_exported", Value::Integer(1), false));

        optimize(&mut module, &Exports::new(&["main"], &[], &["unused_but_exported"]));

        assert_eq!(module.globals.len(), 1);
    }

    #[test]
    fn function_reference_in_a_surviving_global_keeps_its_target_alive_and_remapped() {
        let mut module = Module::new();
        module.append_function(FunctionDefinition::new("main", 0, 0, 0, 0));
        module.append_function(FunctionDefinition::new("dead_before_helper", 0, 0, 0, 0));
        let helper_idx = module.append_function(FunctionDefinition::new("helper", 0, 1, 0, 0)) as i64;
        module.append_global(GlobalDefinition::new("g", Value::FunctionReference(helper_idx), false));

        optimize(&mut module, &Exports::new(&["main"], &[], &["g"]));

        assert_eq!(module.functions.len(), 2, "dead_before_helper should have been pruned");
        assert_eq!(module.functions[1].name, "helper");
        assert_eq!(module.globals[0].initial_value, Value::FunctionReference(1));
    }

    #[test]
    fn function_reference_in_a_constant_list_keeps_its_target_alive_and_remapped() {
        let mut module = Module::new();
        module.append_function(FunctionDefinition::new("main", 0, 0, 0, 0));
        module.append_function(FunctionDefinition::new("dead_before_helper", 0, 0, 0, 0));
        let helper_idx = module.append_function(FunctionDefinition::new("helper", 0, 1, 0, 0)) as i64;
        let list: crate::list::ValueList = [Value::FunctionReference(helper_idx)].into_iter().collect();
        module.append_constant(Value::List(list));

        optimize(&mut module, &Exports::new(&["main"], &[], &[]));

        assert_eq!(module.functions.len(), 2, "dead_before_helper should have been pruned");
        assert_eq!(module.functions[1].name, "helper");
        let Value::List(list) = &module.constants[0] else { panic!("expected a list constant") };
        assert_eq!(list.front(), Some(&Value::FunctionReference(1)));
    }

    #[test]
    fn native_bindings_and_native_functions_compact_in_lock_step() {
        let mut module = Module::new();
        let mut main = FunctionDefinition::new("main", 0, 0, 0, 0);
        main.code = vec![Instruction::new(Opcode::CallNative, 1)];
        module.append_function(main);
        module.append_native_binding(FunctionDefinition::new("dead_native", 0, 0, 0, 0));
        module.append_native_binding(FunctionDefinition::new("live_native", 0, 0, 0, 0));

        optimize(&mut module, &Exports::new(&["main"], &[], &[]));

        assert_eq!(module.native_bindings.len(), 1);
        assert_eq!(module.native_bindings[0].name, "live_native");
        assert_eq!(module.native_functions.len(), 1);
        assert_eq!(module.functions[0].code[0].arg0, 0);
    }
}
