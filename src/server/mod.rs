// 服务器模块入口
// 提供连接器选择、服务器生命周期管理和连接处理功能

pub mod connection;
pub mod connector;
pub mod endpoint;
pub mod instance;
pub mod lifecycle;
pub mod state;
pub mod variant;

// Rust 不允许 loop 作为模块名（关键字），改用 server_loop
#[path = "loop.rs"]
pub mod server_loop;

// 重新导出常用类型
pub use connector::{
    factory_for, ConnectionProtocol, Connector, ConnectorFactory, LegacyConnectorFactory,
    ModernConnectorFactory,
};
pub use endpoint::ServerEndpoint;
pub use instance::ServerInstance;
pub use lifecycle::WebServer;
pub use server_loop::{AcceptLoopConfig, DrainReport};
pub use state::ServerState;
pub use variant::{detect_variant, CapabilityProbe, ProbeError, RuntimeVariant, SocketProbe};
