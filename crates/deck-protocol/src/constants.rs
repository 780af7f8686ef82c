/// Id the backend uses for the administrative root node.
pub const ADMIN_ROOT_ID: &str = "admin";

/// Attribute naming the node a context entry hangs off.
pub const ATTACHED_TO_ATTR: &str = "attached_to";

/// Attributes that may carry the owning agent of a task or file node.
pub const OWNER_ATTRS: [&str; 3] = ["assigned_to", "agent_id", "owner"];

/// Bearer-protected requests carry the token in this header.
pub const AUTH_HEADER: &str = "authorization";

/// Correlation id attached to every outgoing request.
pub const REQUEST_ID_HEADER: &str = "x-request-id";
