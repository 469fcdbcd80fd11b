mod block;
mod c4;
mod class;
mod er;
mod flowchart;
mod git_graph;
mod journey;
mod kanban;
mod packet;
mod pie;
mod quadrant_chart;
mod requirement;
mod sequence;
mod state;
mod timeline;
mod treemap;
