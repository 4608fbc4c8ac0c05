use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::StoreConfig;
use crate::ids::IdGenerator;
use crate::model::ScenarioState;
use crate::projection;
use crate::rebase;

/// Logical operation a store transition belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionLabel {
    UpdateUnit,
    AddUnitPosition,
    ClearUnitState,
    AddSide,
    DeleteSide,
    AddLayer,
    UpdateLayer,
    MoveLayer,
    DeleteLayer,
    BatchLayer,
    AddFeature,
    UpdateFeature,
    UpdateFeatureGeometry,
    UpdateFeatureState,
    MoveFeature,
    DeleteFeature,
    AddMapLayer,
    UpdateMapLayer,
    MoveMapLayer,
    DeleteMapLayer,
    SetCurrentTime,
}

impl ActionLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionLabel::UpdateUnit => "updateUnit",
            ActionLabel::AddUnitPosition => "addUnitPosition",
            ActionLabel::ClearUnitState => "clearUnitState",
            ActionLabel::AddSide => "addSide",
            ActionLabel::DeleteSide => "deleteSide",
            ActionLabel::AddLayer => "addLayer",
            ActionLabel::UpdateLayer => "updateLayer",
            ActionLabel::MoveLayer => "moveLayer",
            ActionLabel::DeleteLayer => "deleteLayer",
            ActionLabel::BatchLayer => "batchLayer",
            ActionLabel::AddFeature => "addFeature",
            ActionLabel::UpdateFeature => "updateFeature",
            ActionLabel::UpdateFeatureGeometry => "updateFeatureGeometry",
            ActionLabel::UpdateFeatureState => "updateFeatureState",
            ActionLabel::MoveFeature => "moveFeature",
            ActionLabel::DeleteFeature => "deleteFeature",
            ActionLabel::AddMapLayer => "addMapLayer",
            ActionLabel::UpdateMapLayer => "updateMapLayer",
            ActionLabel::MoveMapLayer => "moveMapLayer",
            ActionLabel::DeleteMapLayer => "deleteMapLayer",
            ActionLabel::SetCurrentTime => "setCurrentTime",
        }
    }
}

impl fmt::Display for ActionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Record the transition on the undo stack.
    pub undoable: bool,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self { undoable: true }
    }
}

impl ApplyOptions {
    /// Options for transient changes such as visibility sync or time moves.
    pub fn transient() -> Self {
        Self { undoable: false }
    }
}

/// One recorded change between two immutable roots.
#[derive(Debug, Clone)]
pub struct Transition {
    pub label: ActionLabel,
    pub before: Arc<ScenarioState>,
    pub after: Arc<ScenarioState>,
}

#[derive(Debug, Error)]
pub enum TransactionError<E> {
    #[error("{label} aborted: {source}")]
    Aborted {
        label: ActionLabel,
        #[source]
        source: E,
    },
}

impl<E> TransactionError<E> {
    pub fn label(&self) -> ActionLabel {
        match self {
            TransactionError::Aborted { label, .. } => *label,
        }
    }

    pub fn into_inner(self) -> E {
        match self {
            TransactionError::Aborted { source, .. } => source,
        }
    }
}

/// Owner of the scenario root. Every write goes through [`apply`](Self::apply).
///
/// A transaction edits a draft that shares all of its `Arc` maps with the
/// current root. Entries are copied only where the mutator reaches them
/// through `Arc::make_mut`, so untouched subtrees keep their identity in the
/// committed root and observers can compare pointers to find what changed.
#[derive(Debug)]
pub struct ScenarioStore {
    state: Arc<ScenarioState>,
    undo_stack: VecDeque<Transition>,
    redo_stack: Vec<Transition>,
    config: Arc<StoreConfig>,
    ids: IdGenerator,
}

impl ScenarioStore {
    /// Wrap a normalized state and project it at its `current_time`.
    pub fn new(mut state: ScenarioState, ids: IdGenerator, config: Arc<StoreConfig>) -> Self {
        let timestamp = state.current_time;
        projection::project(&mut state, timestamp);
        Self {
            state: Arc::new(state),
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            config,
            ids,
        }
    }

    pub fn state(&self) -> &ScenarioState {
        &self.state
    }

    /// Cheap handle on the current root; stays valid after later writes.
    pub fn snapshot(&self) -> Arc<ScenarioState> {
        Arc::clone(&self.state)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn ids_mut(&mut self) -> &mut IdGenerator {
        &mut self.ids
    }

    pub fn apply<R, E, F>(&mut self, label: ActionLabel, mutator: F) -> Result<R, TransactionError<E>>
    where
        F: FnOnce(&mut ScenarioState) -> Result<R, E>,
        E: fmt::Display,
    {
        self.apply_with(label, ApplyOptions::default(), mutator)
    }

    /// Run `mutator` on a draft and commit it as the new root.
    ///
    /// If the mutator fails, the draft is dropped and neither the root nor
    /// the undo/redo stacks change.
    pub fn apply_with<R, E, F>(
        &mut self,
        label: ActionLabel,
        options: ApplyOptions,
        mutator: F,
    ) -> Result<R, TransactionError<E>>
    where
        F: FnOnce(&mut ScenarioState) -> Result<R, E>,
        E: fmt::Display,
    {
        let mut draft = ScenarioState::clone(&self.state);
        let output = match mutator(&mut draft) {
            Ok(output) => output,
            Err(source) => {
                tracing::warn!(
                    target: "orbat::store",
                    action = %label,
                    error = %source,
                    "store.apply_aborted"
                );
                return Err(TransactionError::Aborted { label, source });
            }
        };

        if self.config.project_on_apply {
            let timestamp = draft.current_time;
            projection::project(&mut draft, timestamp);
        }
        let after = Arc::new(draft);
        let before = std::mem::replace(&mut self.state, Arc::clone(&after));

        if options.undoable {
            self.redo_stack.clear();
            self.undo_stack.push_back(Transition { label, before, after });
            while self.undo_stack.len() > self.config.history_limit {
                self.undo_stack.pop_front();
            }
        }
        tracing::debug!(
            target: "orbat::store",
            action = %label,
            undoable = options.undoable,
            history = self.undo_stack.len(),
            "store.apply"
        );
        Ok(output)
    }

    /// Revert the entities touched by the last undoable transition.
    ///
    /// Changes committed since without an undo entry stay in place and the
    /// live `current_time` is kept. Returns `false` when there is nothing to
    /// undo.
    pub fn undo(&mut self) -> bool {
        let Some(transition) = self.undo_stack.pop_back() else {
            return false;
        };
        self.state = self.replay(&transition.after, &transition.before);
        tracing::debug!(target: "orbat::store", action = %transition.label, "store.undo");
        self.redo_stack.push(transition);
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(transition) = self.redo_stack.pop() else {
            return false;
        };
        self.state = self.replay(&transition.before, &transition.after);
        tracing::debug!(target: "orbat::store", action = %transition.label, "store.redo");
        self.undo_stack.push_back(transition);
        true
    }

    /// Move the live root across a recorded `from -> to` step and re-project.
    fn replay(&self, from: &Arc<ScenarioState>, to: &Arc<ScenarioState>) -> Arc<ScenarioState> {
        let live = self.state.current_time;
        if Arc::ptr_eq(&self.state, from) && to.current_time == live {
            return Arc::clone(to);
        }
        let mut next = if Arc::ptr_eq(&self.state, from) {
            ScenarioState::clone(to)
        } else {
            rebase::rebase(&self.state, from, to)
        };
        projection::project(&mut next, live);
        Arc::new(next)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Labels of the undo stack, oldest first.
    pub fn history(&self) -> Vec<ActionLabel> {
        self.undo_stack.iter().map(|transition| transition.label).collect()
    }
}
