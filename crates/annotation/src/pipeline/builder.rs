use crate::{
    algorithms::{
        extraction::ImageprocContourTracer,
        preprocessing::ThresholdPreprocessor,
        repair::ZeroBufferRepair,
    },
    config::{ChainApproximation, ConversionConfig, HoleAttachment, WindingPolicy},
    pipeline::Converter,
    traits::{ContourTracer, GeometryRepair, MaskPreprocessor},
};

/// Builder for [`Converter`] with a fluent API
pub struct ConverterBuilder {
    config: ConversionConfig,
    preprocessor: Option<Box<dyn MaskPreprocessor>>,
    tracer: Option<Box<dyn ContourTracer>>,
    repair: Option<Box<dyn GeometryRepair>>,
}

impl ConverterBuilder {
    pub fn new() -> Self {
        Self {
            config: ConversionConfig::default(),
            preprocessor: None,
            tracer: None,
            repair: None,
        }
    }

    /// Replace the whole configuration
    pub fn with_config(mut self, config: ConversionConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the mask preprocessor (replaces the threshold default)
    pub fn set_preprocessor<P>(mut self, preprocessor: P) -> Self
    where
        P: MaskPreprocessor + 'static,
    {
        self.preprocessor = Some(Box::new(preprocessor));
        self
    }

    /// Set the contour tracer (replaces the imageproc default)
    pub fn set_contour_tracer<T>(mut self, tracer: T) -> Self
    where
        T: ContourTracer + 'static,
    {
        self.tracer = Some(Box::new(tracer));
        self
    }

    /// Set the repair strategy used when `repair_invalid` is on
    pub fn set_repair<R>(mut self, repair: R) -> Self
    where
        R: GeometryRepair + 'static,
    {
        self.repair = Some(Box::new(repair));
        self
    }

    pub fn with_threshold(mut self, threshold: u8) -> Self {
        self.config.foreground_threshold = threshold;
        self
    }

    pub fn with_min_area(mut self, min_area: f64) -> Self {
        self.config.min_area = min_area;
        self
    }

    pub fn with_winding_policy(mut self, policy: WindingPolicy) -> Self {
        self.config.winding_policy = policy;
        self
    }

    pub fn with_hole_attachment(mut self, attachment: HoleAttachment) -> Self {
        self.config.hole_attachment = attachment;
        self
    }

    pub fn with_approximation(mut self, approximation: ChainApproximation) -> Self {
        self.config.approximation = approximation;
        self
    }

    /// Emit invalid polygons as they are
    pub fn without_repair(mut self) -> Self {
        self.config.repair_invalid = false;
        self
    }

    /// Build the converter, filling unset components from the configuration
    pub fn build(self) -> Converter {
        let preprocessor = self.preprocessor.unwrap_or_else(|| {
            Box::new(ThresholdPreprocessor {
                threshold: self.config.foreground_threshold,
            })
        });

        let tracer = self
            .tracer
            .unwrap_or_else(|| Box::new(ImageprocContourTracer::new(self.config.approximation)));

        let repair = if self.config.repair_invalid {
            Some(self.repair.unwrap_or_else(|| Box::new(ZeroBufferRepair)))
        } else {
            None
        };

        Converter::new(self.config, preprocessor, tracer, repair)
    }
}

impl Default for ConverterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::Result,
        io::heatmap::ClassHeatmap,
        pipeline::{MaskSource, SlideGeometry},
    };
    use geo_types::{Geometry, Polygon};
    use image::{GrayImage, Luma};

    struct Inverting;

    impl MaskPreprocessor for Inverting {
        fn preprocess(&self, image: &GrayImage) -> Result<GrayImage> {
            let mut out = image.clone();
            for pixel in out.pixels_mut() {
                *pixel = Luma([if pixel[0] == 0 { 255 } else { 0 }]);
            }
            Ok(out)
        }
    }

    struct Refuse;

    impl GeometryRepair for Refuse {
        fn repair(&self, _polygon: &Polygon<f64>) -> Option<Geometry<f64>> {
            None
        }
    }

    #[test]
    fn builder_settings_reach_the_config() {
        let converter = Converter::builder()
            .with_threshold(100)
            .with_min_area(12.5)
            .with_hole_attachment(HoleAttachment::NearestRoot)
            .without_repair()
            .build();

        let config = converter.config();
        assert_eq!(config.foreground_threshold, 100);
        assert_eq!(config.min_area, 12.5);
        assert_eq!(config.hole_attachment, HoleAttachment::NearestRoot);
        assert!(!config.repair_invalid);
        assert!(converter.info().contains("repair off"));
    }

    #[test]
    fn custom_preprocessor_is_used() {
        // everything but a 2x2 corner is background, inverted it becomes one blob
        let mut raster = GrayImage::new(10, 10);
        for y in 0..2 {
            for x in 0..2 {
                raster.put_pixel(x, y, Luma([9]));
            }
        }
        let converter = Converter::builder()
            .set_preprocessor(Inverting)
            .set_repair(Refuse)
            .build();

        let output = converter
            .convert(
                &MaskSource::HeatmapDict(vec![ClassHeatmap::new("Cancer", raster)]),
                SlideGeometry::new(10.0, 1.0),
            )
            .unwrap();
        assert_eq!(output.len(), 1);
        assert!(converter.info().contains("repair on"));
    }
}
