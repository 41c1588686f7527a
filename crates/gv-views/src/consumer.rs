//! Consumer abstraction - base trait for every visual consumer

use async_trait::async_trait;
use tracing::{debug, warn};

use gv_color::{ColorScale, DomainRequirement, ScaleDomain};
use gv_core::{
    DimensionIdAndValueDict, RecomputeRegistry, RecomputeSet, SharedState, StateTracker,
    VariableWithDimensions,
};
use gv_data::resolve::{obtain_current_data_source, obtain_current_variable};
use gv_data::{DataFrom, DataService};

use crate::ViewError;

/// A view that reacts to shared-state snapshots.
///
/// Implementors declare which work each key triggers through their
/// [`RecomputeRegistry`] and perform that work in [`Consumer::recompute`].
#[async_trait]
pub trait Consumer: Send {
    /// Get the view type (for logging and configuration)
    fn view_type(&self) -> &str;

    /// Get the display name
    fn display_name(&self) -> &str;

    fn registry(&self) -> &RecomputeRegistry;

    fn tracker_mut(&mut self) -> &mut StateTracker;

    /// Redo `work` for `state`
    async fn recompute(&mut self, state: &SharedState, work: &RecomputeSet) -> Result<(), ViewError>;

    /// Handle a newly published snapshot; returns the work that was done.
    ///
    /// A failed recompute rewinds the tracker, so handing in the same
    /// snapshot again retries the same work.
    async fn on_state(&mut self, state: &SharedState) -> Result<RecomputeSet, ViewError> {
        let previous = self.tracker_mut().previous().cloned();
        let changed = self.tracker_mut().observe(state);
        let work = self.registry().resolve(&changed);
        if work.is_empty() {
            return Ok(work);
        }
        debug!(view = self.view_type(), ?work, "recomputing");
        if let Err(err) = self.recompute(state, &work).await {
            warn!(view = self.view_type(), "recompute failed: {err}");
            self.tracker_mut().rewind(previous);
            return Err(err);
        }
        Ok(work)
    }
}

/// Data source and variable a consumer currently displays
#[derive(Debug, Clone)]
pub(crate) struct Target {
    pub data_source: String,
    pub variable: VariableWithDimensions,
}

pub(crate) async fn resolve_target(
    service: &DataService,
    data_from: Option<&DataFrom>,
    state: &SharedState,
) -> Result<Option<Target>, ViewError> {
    let Some(data_source) = obtain_current_data_source(data_from, state) else {
        return Ok(None);
    };
    let variable = obtain_current_variable(service, &data_source, data_from, state).await?;
    Ok(variable.map(|variable| Target {
        data_source,
        variable,
    }))
}

/// Bind `scale` to the variable-wide domain its type asks for.
///
/// Fetches only that: the extent for sequential and quantize scales, every
/// value for quantile scales, nothing for threshold scales. `None` when the
/// variable has no values to derive a domain from.
pub(crate) async fn bind_domain(
    service: &DataService,
    target: &Target,
    scale: ColorScale,
) -> Result<Option<ColorScale>, ViewError> {
    let variable = target.variable.id();
    let bound = match scale.domain_requirement() {
        DomainRequirement::Extent => {
            let extent = service
                .max_min_for_variable(&target.data_source, variable)
                .await?
                .and_then(|max_min| max_min.extent());
            match extent {
                Some((min, max)) => Some(scale.with_domain(ScaleDomain::Extent(min, max))?),
                None => None,
            }
        }
        DomainRequirement::Population => {
            let population = service
                .value_population(&target.data_source, variable, &DimensionIdAndValueDict::new())
                .await?;
            if population.is_empty() {
                None
            } else {
                Some(scale.with_domain(ScaleDomain::Population(&population))?)
            }
        }
        DomainRequirement::Explicit => Some(scale.with_domain(ScaleDomain::Explicit)?),
    };
    if bound.is_none() {
        debug!(data_source = %target.data_source, variable, "no values to derive a color domain from");
    }
    Ok(bound)
}
