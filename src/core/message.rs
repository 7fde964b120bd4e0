use std::fmt::Debug;

/// A trait providing message's methods.
///
/// A message carries no cost data of its own, it only knows how to map its
/// entries onto the cost vectors of its left and right factors
pub trait Message: Debug + Send {
    /// Number of scalar entries a message carries
    fn size(&self) -> usize;

    /// Adds a message into the left factor's cost vector
    ///
    /// # Arguments
    ///
    /// * `left` - Cost vector of the left factor
    /// * `msg` - Message entries, `msg.len() == self.size()`
    fn repam_left(&self, left: &mut [f64], msg: &[f64]);

    /// Adds a message into the right factor's cost vector
    ///
    /// # Arguments
    ///
    /// * `right` - Cost vector of the right factor
    /// * `msg` - Message entries, `msg.len() == self.size()`
    fn repam_right(&self, right: &mut [f64], msg: &[f64]);
}
