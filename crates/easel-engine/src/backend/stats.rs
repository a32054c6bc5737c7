/// Resource and submission counters for one renderer instance.
///
/// Counters are cumulative except `live_sprites` and
/// `transient_outstanding`, which are snapshots.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct RenderStats {
    /// Images decoded from paths or encoded bytes.
    pub decodes: u64,
    /// Textures created from pixels (sprites and text).
    pub uploads: u64,
    pub live_sprites: usize,
    /// Draw submissions: primitives, sprites and batches.
    pub draw_calls: u64,
    pub batch_submissions: u64,
    pub frames: u64,
    /// Per-frame resources not yet released.
    pub transient_outstanding: usize,
}
