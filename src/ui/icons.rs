pub struct Icons;

impl Icons {
    pub const ROCKET: &str = "🚀";
    pub const CHECK: &str = "✅";
    pub const CROSS: &str = "❌";
    pub const WARN: &str = "⚠️";
    pub const DATABASE: &str = "🗄️";
    pub const MUSIC: &str = "🎵";
    pub const BACKUP: &str = "💾";
    pub const ANTENNA: &str = "📡";
    pub const BROOM: &str = "🧹";
    pub const GLOBE: &str = "🌍";
}
