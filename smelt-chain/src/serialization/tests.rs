//! Tests for job wire serialization.
