//! Scalar value settings: a quantized number inside a source range.

use std::fmt;
use std::sync::Arc;

use crate::data_source::DataSource;
use crate::player::LocalPlayer;

/// Custom display formatter: `(source value, normalized value) -> text`.
pub type ScalarFormatFn = Arc<dyn Fn(f64, f64) -> String + Send + Sync>;

/// Named presentation strategies for scalar values.
#[derive(Clone, Default)]
pub enum ScalarFormat {
    /// Source value with up to three decimals.
    #[default]
    Raw,
    /// Source value with exactly one decimal.
    RawOneDecimal,
    /// Source value with exactly two decimals.
    RawTwoDecimals,
    /// Source value rounded to an integer.
    SourceAsInteger,
    /// Normalized value as a whole percentage.
    ZeroToOnePercent,
    /// Normalized value as a percentage with one decimal.
    ZeroToOnePercentOneDecimal,
    /// Source value in `[0, 1]` as a whole percentage.
    SourceAsPercent1,
    /// Source value in `[0, 100]` as a whole percentage.
    SourceAsPercent100,
    /// Caller supplied formatter.
    Custom(ScalarFormatFn),
}

impl fmt::Debug for ScalarFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Raw => "Raw",
            Self::RawOneDecimal => "RawOneDecimal",
            Self::RawTwoDecimals => "RawTwoDecimals",
            Self::SourceAsInteger => "SourceAsInteger",
            Self::ZeroToOnePercent => "ZeroToOnePercent",
            Self::ZeroToOnePercentOneDecimal => "ZeroToOnePercentOneDecimal",
            Self::SourceAsPercent1 => "SourceAsPercent1",
            Self::SourceAsPercent100 => "SourceAsPercent100",
            Self::Custom(_) => "Custom",
        };
        f.write_str(name)
    }
}

impl ScalarFormat {
    /// Wrap a custom formatter.
    pub fn custom(f: impl Fn(f64, f64) -> String + Send + Sync + 'static) -> Self {
        Self::Custom(Arc::new(f))
    }

    /// Produce display text.
    #[must_use]
    pub fn format(&self, source: f64, normalized: f64) -> String {
        match self {
            Self::Raw => trim_decimals(source, 3),
            Self::RawOneDecimal => fixed(source, 1),
            Self::RawTwoDecimals => fixed(source, 2),
            Self::SourceAsInteger => fixed(source, 0),
            Self::ZeroToOnePercent => percent((100.0 * normalized).round()),
            Self::ZeroToOnePercentOneDecimal => {
                format!("{}%", fixed((1000.0 * normalized).round() / 10.0, 1))
            },
            Self::SourceAsPercent1 => percent((100.0 * source).round()),
            Self::SourceAsPercent100 => percent(source.round()),
            Self::Custom(f) => f(source, normalized),
        }
    }
}

fn percent(whole: f64) -> String {
    format!("{}%", whole as i64)
}

fn fixed(value: f64, decimals: usize) -> String {
    let text = format!("{value:.decimals$}");
    strip_negative_zero(text)
}

fn trim_decimals(value: f64, max_decimals: usize) -> String {
    let mut text = format!("{value:.max_decimals$}");
    if text.contains('.') {
        let trimmed = text.trim_end_matches('0').trim_end_matches('.').len();
        text.truncate(trimmed);
    }
    strip_negative_zero(text)
}

fn strip_negative_zero(text: String) -> String {
    if text.starts_with('-') && text[1..].chars().all(|c| c == '0' || c == '.') {
        text[1..].to_string()
    } else {
        text
    }
}

/// Value data for a scalar setting.
#[derive(Clone)]
pub struct ScalarValue {
    source_min: f64,
    source_max: f64,
    step: f64,
    minimum: Option<f64>,
    maximum: Option<f64>,
    default: Option<f64>,
    initial: f64,
    format: ScalarFormat,
    getter: Option<Arc<dyn DataSource>>,
    setter: Option<Arc<dyn DataSource>>,
}

impl fmt::Debug for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScalarValue")
            .field("source_range", &(self.source_min..=self.source_max))
            .field("step", &self.step)
            .field("minimum", &self.minimum)
            .field("maximum", &self.maximum)
            .field("default", &self.default)
            .field("initial", &self.initial)
            .field("format", &self.format)
            .field("getter", &self.getter)
            .finish_non_exhaustive()
    }
}

impl Default for ScalarValue {
    fn default() -> Self {
        Self::new(0.0, 1.0, 0.01)
    }
}

impl ScalarValue {
    /// Create a value over `[min, max]` quantized to `step`.
    #[must_use]
    pub fn new(min: f64, max: f64, step: f64) -> Self {
        Self {
            source_min: min,
            source_max: max,
            step,
            minimum: None,
            maximum: None,
            default: None,
            initial: 0.0,
            format: ScalarFormat::Raw,
            getter: None,
            setter: None,
        }
    }

    /// Use the same source for reading and writing.
    #[must_use]
    pub fn with_source(mut self, source: Arc<dyn DataSource>) -> Self {
        self.getter = Some(Arc::clone(&source));
        self.setter = Some(source);
        self
    }

    /// Set the getter.
    #[must_use]
    pub fn with_getter(mut self, getter: Arc<dyn DataSource>) -> Self {
        self.getter = Some(getter);
        self
    }

    /// Set the setter.
    #[must_use]
    pub fn with_setter(mut self, setter: Arc<dyn DataSource>) -> Self {
        self.setter = Some(setter);
        self
    }

    /// Set the default value.
    #[must_use]
    pub fn with_default(mut self, default: f64) -> Self {
        self.default = Some(default);
        self
    }

    /// Lowest value that can be committed.
    #[must_use]
    pub fn with_minimum_limit(mut self, minimum: f64) -> Self {
        self.minimum = Some(minimum);
        self
    }

    /// Highest value that can be committed.
    #[must_use]
    pub fn with_maximum_limit(mut self, maximum: f64) -> Self {
        self.maximum = Some(maximum);
        self
    }

    /// Set the display format.
    #[must_use]
    pub fn with_format(mut self, format: ScalarFormat) -> Self {
        self.format = format;
        self
    }

    /// Source range `(min, max)`.
    #[must_use]
    pub const fn source_range(&self) -> (f64, f64) {
        (self.source_min, self.source_max)
    }

    /// Quantization step.
    #[must_use]
    pub const fn step(&self) -> f64 {
        self.step
    }

    /// Commit limits `(minimum, maximum)`.
    #[must_use]
    pub const fn limits(&self) -> (Option<f64>, Option<f64>) {
        (self.minimum, self.maximum)
    }

    /// Configured default value.
    #[must_use]
    pub const fn default_value(&self) -> Option<f64> {
        self.default
    }

    /// Default value mapped into `[0, 1]`.
    #[must_use]
    pub fn default_value_normalized(&self) -> Option<f64> {
        self.default.map(|default| self.normalize(default))
    }

    /// Value captured by the last store-initial.
    #[must_use]
    pub const fn initial_value(&self) -> f64 {
        self.initial
    }

    /// Display format.
    #[must_use]
    pub fn format(&self) -> &ScalarFormat {
        &self.format
    }

    /// Getter data source.
    #[must_use]
    pub fn getter(&self) -> Option<&Arc<dyn DataSource>> {
        self.getter.as_ref()
    }

    /// Do both data sources exist and resolve for this player?
    #[must_use]
    pub fn resolve(&self, player: &LocalPlayer) -> bool {
        matches!((&self.getter, &self.setter), (Some(g), Some(s)) if g.resolve(player) && s.resolve(player))
    }

    /// Current value through the getter. Unparsable or missing values read as zero.
    #[must_use]
    pub fn value(&self, player: &LocalPlayer) -> f64 {
        self.getter
            .as_ref()
            .and_then(|getter| getter.value_as_string(player).trim().parse().ok())
            .unwrap_or(0.0)
    }

    /// Current value mapped into `[0, 1]`.
    #[must_use]
    pub fn value_normalized(&self, player: &LocalPlayer) -> f64 {
        self.normalize(self.value(player))
    }

    /// Map a source value into `[0, 1]`, clamped.
    #[must_use]
    pub fn normalize(&self, source: f64) -> f64 {
        let span = self.source_max - self.source_min;
        if span == 0.0 {
            return 0.0;
        }
        ((source - self.source_min) / span).clamp(0.0, 1.0)
    }

    /// Map a normalized value back into the source range, clamped.
    #[must_use]
    pub fn denormalize(&self, normalized: f64) -> f64 {
        self.source_min + normalized.clamp(0.0, 1.0) * (self.source_max - self.source_min)
    }

    /// Round to the nearest step (half away from zero), then clamp to the commit limits.
    #[must_use]
    pub fn quantize(&self, value: f64) -> f64 {
        let mut value = if self.step > 0.0 {
            (value / self.step).round() * self.step
        } else {
            value
        };

        if let Some(minimum) = self.minimum {
            value = value.max(minimum);
        }
        if let Some(maximum) = self.maximum {
            value = value.min(maximum);
        }

        value
    }

    /// Display text for the current value.
    #[must_use]
    pub fn formatted_text(&self, player: &LocalPlayer) -> String {
        let source = self.value(player);
        self.format.format(source, self.normalize(source))
    }

    /// Quantize and write through the setter. Returns the committed value.
    pub(crate) fn write(&self, player: &LocalPlayer, value: f64) -> Option<f64> {
        let value = self.quantize(value);
        let setter = self.setter.as_ref()?;
        setter.set_value(player, &value.to_string());
        Some(value)
    }

    /// Capture the current value as the initial value.
    pub(crate) fn store_initial(&mut self, player: &LocalPlayer) {
        self.initial = self.value(player);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_source::PropertySource;

    fn volume(player: &LocalPlayer) -> ScalarValue {
        player.define_property("volume", "80");
        ScalarValue::new(0.0, 100.0, 5.0)
            .with_minimum_limit(0.0)
            .with_maximum_limit(100.0)
            .with_default(80.0)
            .with_source(PropertySource::shared("volume"))
    }

    #[test]
    fn test_quantize_rounds_to_step() {
        let player = LocalPlayer::new("P1");
        let value = volume(&player);

        assert_eq!(value.quantize(77.0), 75.0);
        assert_eq!(value.quantize(77.5), 80.0);
        assert_eq!(value.quantize(-3.0), 0.0);
        assert_eq!(value.quantize(140.0), 100.0);
    }

    #[test]
    fn test_quantize_half_away_from_zero() {
        let value = ScalarValue::new(-10.0, 10.0, 1.0);
        assert_eq!(value.quantize(2.5), 3.0);
        assert_eq!(value.quantize(-2.5), -3.0);
    }

    #[test]
    fn test_limits_clamp_after_quantizing() {
        let value = ScalarValue::new(0.0, 100.0, 10.0).with_maximum_limit(95.0);
        assert_eq!(value.quantize(96.0), 95.0);
    }

    #[test]
    fn test_write_and_read() {
        let player = LocalPlayer::new("P1");
        let value = volume(&player);

        assert_eq!(value.write(&player, 77.0), Some(75.0));
        assert_eq!(value.value(&player), 75.0);
        assert_eq!(player.property("volume").as_deref(), Some("75"));
    }

    #[test]
    fn test_normalized_mapping() {
        let player = LocalPlayer::new("P1");
        let value = volume(&player);

        assert!((value.value_normalized(&player) - 0.8).abs() < 1e-9);
        assert_eq!(value.normalize(150.0), 1.0);
        assert_eq!(value.denormalize(0.25), 25.0);
        assert_eq!(value.denormalize(-1.0), 0.0);
        assert_eq!(value.default_value_normalized(), Some(0.8));
    }

    #[test]
    fn test_unparsable_reads_as_zero() {
        let player = LocalPlayer::new("P1").with_property("gamma", "bright");
        let value = ScalarValue::new(0.0, 5.0, 0.1).with_source(PropertySource::shared("gamma"));
        assert_eq!(value.value(&player), 0.0);
    }

    #[test]
    fn test_formats() {
        assert_eq!(ScalarFormat::Raw.format(2.2, 0.0), "2.2");
        assert_eq!(ScalarFormat::Raw.format(75.0, 0.0), "75");
        assert_eq!(ScalarFormat::Raw.format(1.23456, 0.0), "1.235");
        assert_eq!(ScalarFormat::RawOneDecimal.format(2.0, 0.0), "2.0");
        assert_eq!(ScalarFormat::RawTwoDecimals.format(0.5, 0.0), "0.50");
        assert_eq!(ScalarFormat::SourceAsInteger.format(74.6, 0.0), "75");
        assert_eq!(ScalarFormat::ZeroToOnePercent.format(0.0, 0.805), "81%");
        assert_eq!(ScalarFormat::ZeroToOnePercentOneDecimal.format(0.0, 0.8054), "80.5%");
        assert_eq!(ScalarFormat::SourceAsPercent1.format(0.7, 0.0), "70%");
        assert_eq!(ScalarFormat::SourceAsPercent100.format(42.4, 0.0), "42%");
        assert_eq!(ScalarFormat::Raw.format(-0.0001, 0.0), "0");
    }

    #[test]
    fn test_custom_format() {
        let format = ScalarFormat::custom(|source, _| format!("{source} ms"));
        assert_eq!(format.format(16.0, 0.0), "16 ms");
    }
}
