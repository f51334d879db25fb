//! Block-character waveforms for the terminal

const BLOCKS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

fn block(level: f32) -> char {
    let level = if level.is_finite() { level.clamp(0.0, 1.0) } else { 0.0 };
    let index = (level * (BLOCKS.len() - 1) as f32).round() as usize;
    BLOCKS[index]
}

/// Render the most recent `width` live levels, right-aligned
pub fn render_levels(levels: &[f32], width: usize) -> String {
    let recent = &levels[levels.len().saturating_sub(width)..];
    let padding = width - recent.len();
    std::iter::repeat(' ')
        .take(padding)
        .chain(recent.iter().map(|l| block(*l)))
        .collect()
}

/// Render a static waveform scaled to its own peak
pub fn render_static(bars: &[f32]) -> String {
    let peak = bars.iter().copied().fold(0.0f32, f32::max);
    if peak <= 0.0 {
        return bars.iter().map(|_| BLOCKS[0]).collect();
    }
    bars.iter().map(|b| block(b / peak)).collect()
}
