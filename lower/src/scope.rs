//! Name-keyed scoped stacks.
//!
//! One type backs both pieces of per-pass state: the constrained-shadow
//! tracker (`Scope<()>`, membership only) and the descriptor-need registry
//! (`Scope<usize>`, tuple-element indices). Entries for the same name stack,
//! so a name shadowed in one subtree and not in a sibling resolves correctly
//! as long as every push is paired with a pop on the way back out.

use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct Scope<T> {
    stacks: HashMap<String, Vec<T>>,
}

impl<T> Default for Scope<T> {
    fn default() -> Self {
        Self { stacks: HashMap::new() }
    }
}

impl<T> Scope<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: &str, value: T) {
        self.stacks.entry(name.to_string()).or_default().push(value);
    }

    /// Pop the top entry for `name`, if any. Empty stacks are removed so
    /// `contains` stays accurate.
    pub fn pop(&mut self, name: &str) -> Option<T> {
        let stack = self.stacks.get_mut(name)?;
        let value = stack.pop();
        if stack.is_empty() {
            self.stacks.remove(name);
        }
        value
    }

    pub fn contains(&self, name: &str) -> bool {
        self.stacks.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }
}
