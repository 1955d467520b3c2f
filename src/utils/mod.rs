//! Utility functions for image processing
//!
//! This module provides the building blocks shared by the scanning stages:
//! - Grayscale conversion (RGB to luminance)
//! - Binarization (Otsu's method and local-mean adaptive thresholding)
//! - Geometry (perspective transforms, point ordering, polygons, masking)

pub mod binarization;
pub mod geometry;
pub mod grayscale;
