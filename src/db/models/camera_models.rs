use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Camera model
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Camera {
    pub id: i64,
    pub name: String,
    pub location: Option<String>,
    pub status: String,
    pub ip_address: Option<String>,
    pub created_at: NaiveDateTime,
    pub last_active: NaiveDateTime,
}

/// Cameras inserted into an empty database: (name, location, status, ip_address)
pub const DEFAULT_CAMERAS: [(&str, &str, &str, &str); 8] = [
    ("Main Entrance", "Building A - Front", "online", "192.168.1.101"),
    ("Parking Lot", "Outdoor - West Side", "online", "192.168.1.102"),
    ("Loading Dock", "Building B - Rear", "online", "192.168.1.103"),
    ("Rear Exit", "Building A - Back", "online", "192.168.1.104"),
    ("Lobby", "Building A - Ground Floor", "online", "192.168.1.105"),
    ("Warehouse", "Building B - Main Area", "online", "192.168.1.106"),
    ("Side Gate", "Perimeter - East", "online", "192.168.1.107"),
    ("Rooftop", "Building A - Top Floor", "online", "192.168.1.108"),
];
