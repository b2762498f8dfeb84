//! Registry metadata keys through which members publish their cluster address
//!
//! These keys form a wire contract between members and are not configurable.

/// Host of the member's cluster-internal address
pub const HAZELCAST_HOST: &str = "hazelcast.host";

/// Port of the member's cluster-internal address, as a decimal string
pub const HAZELCAST_PORT: &str = "hazelcast.port";

/// Group name of the member's cluster
pub const HAZELCAST_GROUP_NAME: &str = "hazelcast.groupName";
