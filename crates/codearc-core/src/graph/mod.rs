pub mod call_graph;
pub mod symbol_table;
