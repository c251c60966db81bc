//! Promotion of units to full tables.
//!
//! Expansion always happens on an *owner*: a shared unit is expanded by
//! expanding the unit its user links lead to. Each owner goes through
//! `Pending -> InProgress -> Expanded | Failed` exactly once; every later
//! request is answered from the memoized state.

use smallvec::SmallVec;
use tracing::{debug, info, warn};

use super::PartialIndex;
use crate::error::{SymdexError, SymdexResult};
use crate::index::{ExpansionState, TableId, UnitId};

impl PartialIndex
{
    /// Full table of `unit`, building it on first request
    ///
    /// Non-shared dependencies are expanded first. The reader is called at
    /// most once per owner, whether it succeeds or not.
    ///
    /// ## Errors
    ///
    /// - `ReadFailed` if the reader failed for the owner (now or earlier)
    /// - `ReentrantExpansion` if the owner is already being expanded
    /// - `UnitNotFound` or `UserCycle` for broken handles
    /// - `Interrupted` if cancellation was requested between dependencies
    pub fn expand(&mut self, unit: UnitId) -> SymdexResult<TableId>
    {
        let owner = self.store.owner_of(unit)?;
        self.expand_owner(owner)
    }

    fn expand_owner(&mut self, owner: UnitId) -> SymdexResult<TableId>
    {
        let target = self.store.get(owner)?;
        match target.state() {
            ExpansionState::Expanded(table) => return Ok(*table),
            ExpansionState::Failed(reason) => {
                return Err(SymdexError::ReadFailed {
                    unit: owner,
                    filename: target.filename().to_string(),
                    reason: reason.clone(),
                });
            }
            ExpansionState::InProgress => return Err(SymdexError::ReentrantExpansion(owner)),
            ExpansionState::Pending => {}
        }

        if self.config.verbose {
            info!("Reading in symbols for {}...", target.filename());
        } else {
            debug!(unit = %owner, filename = target.filename(), "expanding unit");
        }
        self.store.get_mut(owner)?.set_state(ExpansionState::InProgress);

        if let Err(err) = self.expand_dependencies(owner) {
            self.store.get_mut(owner)?.set_state(ExpansionState::Pending);
            return Err(err);
        }

        let result = {
            let target = self.store.get(owner)?;
            self.reader.read_compunit(target, &self.store)
        };
        match result {
            Ok(mut table) => {
                table.set_producer(owner);
                let id = self.tables.push(table)?;
                self.store.get_mut(owner)?.set_state(ExpansionState::Expanded(id));
                Ok(id)
            }
            Err(err) => {
                let reason = err.to_string();
                let target = self.store.get_mut(owner)?;
                warn!(unit = %owner, filename = target.filename(), "failed to read full symbols: {reason}");
                target.set_state(ExpansionState::Failed(reason.clone()));
                Err(SymdexError::ReadFailed {
                    unit: owner,
                    filename: target.filename().to_string(),
                    reason,
                })
            }
        }
    }

    /// Expand every non-shared dependency of `unit` that is not read in yet
    ///
    /// A dependency whose reader fails is skipped; its failure was already
    /// logged and memoized.
    ///
    /// ## Errors
    ///
    /// `Interrupted`, `ReentrantExpansion` (a cycle through non-shared
    /// dependencies), or broken handles.
    pub fn expand_dependencies(&mut self, unit: UnitId) -> SymdexResult<()>
    {
        let dependencies: SmallVec<[UnitId; 4]> = SmallVec::from_slice(self.store.get(unit)?.dependencies());
        for dependency in dependencies {
            let target = self.store.get(dependency)?;
            if target.is_shared() || target.state().is_read_in() {
                continue;
            }
            self.cancel.check()?;
            match self.expand_owner(dependency) {
                Ok(_) => {}
                Err(err) if err.is_unit_local() => {}
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Expand every unit of the image
    ///
    /// Units whose reader fails are skipped.
    ///
    /// ## Errors
    ///
    /// Errors of the partial scan, `Interrupted`, or contract violations.
    pub fn expand_all(&mut self) -> SymdexResult<()>
    {
        let units: Vec<UnitId> = self.require_partial_symbols()?.map(|unit| unit.id()).collect();
        for unit in units {
            self.cancel.check()?;
            match self.expand(unit) {
                Ok(_) => {}
                Err(err) if err.is_unit_local() => {}
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }
}
