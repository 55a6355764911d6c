//! Data structures representing format components.
//!
//! Contains structured representations of bitstream elements: the frame
//! header, the seek metadata tags carried by the first frame (Xing, Info,
//! LAME, VBRI) and the ID3 tags surrounding the audio.

pub mod header;
pub mod id3;
pub mod lame;
pub mod seek;
pub mod vbri;
pub mod xing;
