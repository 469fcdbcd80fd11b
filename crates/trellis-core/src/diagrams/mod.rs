//! One module per notation. Each exposes `NOTATION`, `HEADERS`, `parse_document` (text to CST),
//! `transform` (CST to model) and `parse`, which chains the two.

use serde::Serialize;

use crate::error::{CanonResult, Error, Result};
use crate::model::{Model, Violation};

pub mod architecture;
pub mod block;
pub mod c4;
pub mod class;
pub mod er;
pub mod flowchart;
pub mod gantt;
pub mod git_graph;
pub mod journey;
pub mod kanban;
pub mod mindmap;
pub mod packet;
pub mod pie;
pub mod quadrant_chart;
pub mod requirement;
pub mod sankey;
pub mod sequence;
pub mod state;
pub mod timeline;
pub mod treemap;

/// Attaches the notation name to a failed transform.
pub(crate) fn canonicalized<T>(notation: &'static str, result: CanonResult<T>) -> Result<T> {
    result.map_err(|source| {
        tracing::debug!(notation, error = %source, "canonicalization failed");
        Error::canonicalization(notation, source)
    })
}

macro_rules! diagram_enum {
    ($($variant:ident($module:ident::$model:ident)),+ $(,)?) => {
        /// A parsed document of any notation.
        #[derive(Debug, Clone, PartialEq, Serialize)]
        #[serde(tag = "type", rename_all = "camelCase")]
        pub enum Diagram {
            $($variant($module::$model),)+
        }

        impl Diagram {
            /// The `NOTATION` of the module that produced this diagram.
            pub fn notation(&self) -> &'static str {
                match self {
                    $(Self::$variant(_) => $module::NOTATION,)+
                }
            }

            fn as_model(&self) -> &dyn Model {
                match self {
                    $(Self::$variant(m) => m,)+
                }
            }
        }

        $(
            impl From<$module::$model> for Diagram {
                fn from(model: $module::$model) -> Self {
                    Self::$variant(model)
                }
            }
        )+
    };
}

diagram_enum! {
    Flowchart(flowchart::FlowchartModel),
    Sequence(sequence::SequenceModel),
    Class(class::ClassModel),
    State(state::StateModel),
    Er(er::ErModel),
    Gantt(gantt::GanttModel),
    GitGraph(git_graph::GitGraphModel),
    Mindmap(mindmap::MindmapModel),
    Treemap(treemap::TreemapModel),
    Kanban(kanban::KanbanModel),
    Timeline(timeline::TimelineModel),
    Journey(journey::JourneyModel),
    Pie(pie::PieModel),
    Requirement(requirement::RequirementModel),
    C4(c4::C4Model),
    Block(block::BlockModel),
    QuadrantChart(quadrant_chart::QuadrantModel),
    Packet(packet::PacketModel),
    Sankey(sankey::SankeyModel),
    Architecture(architecture::ArchitectureModel),
}

impl Model for Diagram {
    fn entity_ids(&self) -> Vec<&str> {
        self.as_model().entity_ids()
    }

    fn relation_endpoints(&self) -> Vec<(&str, &str)> {
        self.as_model().relation_endpoints()
    }

    fn group_refs(&self) -> Vec<(&str, &str)> {
        self.as_model().group_refs()
    }

    fn group_ids(&self) -> Vec<&str> {
        self.as_model().group_ids()
    }

    fn violations(&self) -> Vec<Violation> {
        self.as_model().violations()
    }
}
