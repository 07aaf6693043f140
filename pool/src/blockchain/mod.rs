/// Chain node communication
/// Handles RPC calls to the ETC node and the active work templates

pub mod rpc_client;
pub mod template_manager;

pub use rpc_client::{EtcRpcClient, NodeClient, PendingBlock, Work};
pub use template_manager::{
    BlockTemplateManager, TemplateCache, TemplateRefresher, TemplateSet, WorkTemplate,
};
