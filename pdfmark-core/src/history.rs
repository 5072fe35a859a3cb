//! Linear undo/redo log.
//!
//! A new action after an undo discards the undone branch; there is no tree
//! history.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ObjRef;

/// What an action touched, so the caller can find and redraw it again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionSubject {
    Annotation(ObjRef),
    /// An annotation that has not been registered yet.
    NewAnnotation,
    OutlineItem { title: String, page_index: usize },
    Outline,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionParams {
    pub page_index: Option<usize>,
    pub subject: ActionSubject,
}

pub trait Reversible<T: ?Sized> {
    type Error;

    fn redo(&mut self, target: &mut T) -> Result<(), Self::Error>;
    fn undo(&mut self, target: &mut T) -> Result<(), Self::Error>;
    fn params(&self) -> &ActionParams;
}

#[derive(Debug)]
pub struct EditHistory<A> {
    undo: Vec<A>,
    redo: Vec<A>,
}

impl<A> Default for EditHistory<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> EditHistory<A> {
    pub fn new() -> Self {
        Self {
            undo: Vec::new(),
            redo: Vec::new(),
        }
    }

    /// Applies `action` and records it. Clears the redo stack.
    pub fn do_action<T: ?Sized>(
        &mut self,
        mut action: A,
        target: &mut T,
    ) -> Result<ActionParams, A::Error>
    where
        A: Reversible<T>,
    {
        action.redo(target)?;
        let params = action.params().clone();
        debug!(?params, discarded = self.redo.len(), "action applied");
        self.undo.push(action);
        self.redo.clear();
        Ok(params)
    }

    /// Reverts the most recent action. `Ok(None)` when there is nothing to
    /// undo.
    pub fn undo<T: ?Sized>(&mut self, target: &mut T) -> Result<Option<ActionParams>, A::Error>
    where
        A: Reversible<T>,
    {
        let Some(mut action) = self.undo.pop() else {
            return Ok(None);
        };
        if let Err(err) = action.undo(target) {
            self.undo.push(action);
            return Err(err);
        }
        let params = action.params().clone();
        self.redo.push(action);
        Ok(Some(params))
    }

    pub fn redo<T: ?Sized>(&mut self, target: &mut T) -> Result<Option<ActionParams>, A::Error>
    where
        A: Reversible<T>,
    {
        let Some(mut action) = self.redo.pop() else {
            return Ok(None);
        };
        if let Err(err) = action.redo(target) {
            self.redo.push(action);
            return Err(err);
        }
        let params = action.params().clone();
        self.undo.push(action);
        Ok(Some(params))
    }

    pub fn undo_stack(&self) -> &[A] {
        &self.undo
    }

    pub fn redo_stack(&self) -> &[A] {
        &self.redo
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Add {
        name: &'static str,
        amount: i64,
        params: ActionParams,
    }

    impl Add {
        fn new(name: &'static str, amount: i64) -> Self {
            Self {
                name,
                amount,
                params: ActionParams {
                    page_index: Some(amount as usize),
                    subject: ActionSubject::Outline,
                },
            }
        }
    }

    impl Reversible<i64> for Add {
        type Error = String;

        fn redo(&mut self, target: &mut i64) -> Result<(), Self::Error> {
            *target += self.amount;
            Ok(())
        }

        fn undo(&mut self, target: &mut i64) -> Result<(), Self::Error> {
            if *target < self.amount {
                return Err(format!("{} cannot be reverted", self.name));
            }
            *target -= self.amount;
            Ok(())
        }

        fn params(&self) -> &ActionParams {
            &self.params
        }
    }

    fn names(actions: &[Add]) -> Vec<&'static str> {
        actions.iter().map(|a| a.name).collect()
    }

    #[test]
    fn new_action_discards_redo_branch() {
        let mut total = 0;
        let mut history = EditHistory::new();
        history.do_action(Add::new("A", 1), &mut total).unwrap();
        history.do_action(Add::new("B", 2), &mut total).unwrap();
        history.undo(&mut total).unwrap();
        history.do_action(Add::new("C", 4), &mut total).unwrap();

        assert_eq!(names(history.undo_stack()), ["A", "C"]);
        assert!(history.redo_stack().is_empty());
        assert_eq!(total, 5);
    }

    #[test]
    fn undo_and_redo_report_the_affected_page() {
        let mut total = 0;
        let mut history = EditHistory::new();
        history.do_action(Add::new("A", 3), &mut total).unwrap();

        let undone = history.undo(&mut total).unwrap().unwrap();
        assert_eq!(undone.page_index, Some(3));
        assert_eq!(total, 0);
        assert!(history.can_redo());

        let redone = history.redo(&mut total).unwrap().unwrap();
        assert_eq!(redone.page_index, Some(3));
        assert_eq!(total, 3);
        assert!(!history.can_redo());
    }

    #[test]
    fn empty_stacks_are_a_no_op() {
        let mut total = 7;
        let mut history: EditHistory<Add> = EditHistory::new();
        assert_eq!(history.undo(&mut total).unwrap(), None);
        assert_eq!(history.redo(&mut total).unwrap(), None);
        assert_eq!(total, 7);
    }

    #[test]
    fn failed_revert_keeps_action_on_undo_stack() {
        let mut total = 0;
        let mut history = EditHistory::new();
        history.do_action(Add::new("A", 5), &mut total).unwrap();
        total = 0;
        assert!(history.undo(&mut total).is_err());
        assert_eq!(names(history.undo_stack()), ["A"]);
        assert!(history.redo_stack().is_empty());
    }
}
