pub mod anchors;
pub mod layout;
pub mod matrix;
pub mod point;
pub mod record;
pub mod rect;

pub use anchors::{AnchorId, AnchorSet};
pub use layout::{
    AnchorSpec, BubbleSpec, ExtIdCell, ExtIdSpec, NameBox, NameSpec, OptionSpec, PageLayout,
    PageSize, QuestionSpec,
};
pub use matrix::BitMatrix;
pub use point::Point;
pub use record::ResultRecord;
pub use rect::Rect;
