//! Encoder binding and display content per mode

use std::time::Instant;

use crate::binder::{node_parameters, BindSource};
use crate::display::{DisplayModel, Scroll, ValueBar};
use crate::graph::{Graph, ParamId, ParamKind};
use crate::mode::Mode;

impl super::SurfaceEngine {
    /// Offer the binder the parameter list for the current mode and focus
    pub(crate) fn update_binding(&mut self, graph: &dyn Graph) {
        if self.modes.mode() == Mode::Mixer {
            let params = self
                .mixer_columns(graph)
                .into_iter()
                .map(|(_, param)| param)
                .collect();
            self.binder.rebind(Some(self.mixer_source()), params);
            return;
        }

        match self.navigator.focused_node() {
            Some(node) => {
                let (params, overridden) = node_parameters(graph, node);
                self.binder.rebind(Some(BindSource::Node { node, overridden }), params);
            }
            None => {
                self.binder.clear();
            }
        }
    }

    pub(crate) fn display_model(&self, graph: &dyn Graph, now: Instant) -> DisplayModel {
        match self.modes.mode() {
            Mode::AddModule => {
                let mut model = DisplayModel::titled("Add module");
                model.labels = graph
                    .spawnables()
                    .into_iter()
                    .take(self.profile.encoder_count())
                    .map(|s| s.name)
                    .collect();
                model
            }
            Mode::Mixer => {
                let mut model = DisplayModel::titled("Mixer");
                model.context = Some(match self.mixer_source() {
                    BindSource::TrackSends => "Sends".to_string(),
                    _ => "Gains".to_string(),
                });
                let columns = self.mixer_columns(graph);
                model.labels = self
                    .binder
                    .bound()
                    .iter()
                    .filter_map(|p| columns.iter().find(|(_, q)| q == p))
                    .map(|(name, _)| name.clone())
                    .collect();
                model.value = self
                    .binder
                    .display_param(now)
                    .and_then(|p| value_bar(graph, p));
                model
            }
            Mode::SnapshotView => {
                let mut model = DisplayModel::titled("Snapshots");
                model.context = self.selected_track.and_then(|id| {
                    graph.tracks().into_iter().find(|t| t.id == id).map(|t| t.name)
                });
                model.labels = graph.tracks().into_iter().map(|t| t.name).collect();
                model
            }
            Mode::Normal | Mode::GridDelegated(_) => self.module_model(graph, now),
        }
    }

    /// Tracks that have a parameter for the current mixer source, in order
    fn mixer_columns(&self, graph: &dyn Graph) -> Vec<(String, ParamId)> {
        let source = self.mixer_source();
        graph
            .tracks()
            .into_iter()
            .filter_map(|t| {
                let param = match source {
                    BindSource::TrackSends => t.send,
                    _ => t.gain,
                }?;
                Some((t.name, param))
            })
            .collect()
    }

    fn module_model(&self, graph: &dyn Graph, now: Instant) -> DisplayModel {
        let Some(target) = self.navigator.current() else {
            return DisplayModel::titled("No module");
        };
        let title = graph
            .node_name(target.node)
            .unwrap_or_else(|| "No module".to_string());

        let pages = self.binder.page_count();
        DisplayModel {
            title,
            context: target.context.clone(),
            labels: self
                .binder
                .bound()
                .iter()
                .map(|&p| graph.param_info(p).map(|i| i.name).unwrap_or_default())
                .collect(),
            value: self
                .binder
                .display_param(now)
                .and_then(|p| value_bar(graph, p)),
            scroll: (pages > 1).then(|| Scroll {
                page: self.binder.page(),
                pages,
            }),
        }
    }
}

fn value_bar(graph: &dyn Graph, param: ParamId) -> Option<ValueBar> {
    let info = graph.param_info(param)?;
    let steps = match info.kind {
        ParamKind::Slider { steps } => steps,
        _ => None,
    };
    Some(ValueBar {
        name: info.name,
        text: info.display,
        normalized: graph.param_value(param).unwrap_or(0.0),
        steps,
    })
}
