use std::fmt::Debug;

/// A trait providing the minimal contract of a factor payload: a cost vector
/// over the joint labeling of the factor's scope and a committed label
pub trait Factor: Debug + Send {
    /// Returns the length of the cost vector (number of joint labels)
    fn size(&self) -> usize;

    /// Returns the cost vector
    fn cost(&self) -> &[f64];

    /// Returns the cost vector for in place reparametrization
    fn cost_mut(&mut self) -> &mut [f64];

    /// Returns the committed label. A label that is out of range
    /// (`>= size()`) means that nothing has been committed yet
    fn primal(&self) -> usize;

    /// Commits a label
    ///
    /// # Arguments
    ///
    /// * `label` - A new committed label
    fn set_primal(&mut self, label: usize);

    /// Returns the lower bound of a factor, i.e. the minimal entry of its cost vector
    #[inline]
    fn lower_bound(&self) -> f64 {
        self.cost().iter().copied().fold(f64::INFINITY, f64::min)
    }
}
