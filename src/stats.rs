pub fn format_seconds(secs: f64) -> String {
    if secs >= 60.0 {
        return format!("{:.1}min", secs / 60.0);
    }
    if secs >= 1.0 {
        return format!("{secs:.3}s");
    }
    if secs >= 0.001 {
        return format!("{:.3}ms", secs * 1_000.0);
    }
    format!("{:.3}us", secs * 1_000_000.0)
}

pub fn format_bytes(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = 1024.0 * 1024.0;
    const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

    let value = bytes as f64;
    if value >= GIB {
        return format!("{:.2}GiB", value / GIB);
    }
    if value >= MIB {
        return format!("{:.2}MiB", value / MIB);
    }
    if value >= KIB {
        return format!("{:.2}KiB", value / KIB);
    }
    format!("{bytes}B")
}
