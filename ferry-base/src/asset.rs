use downcast_rs::Downcast;

/// A loaded asset as held by the asset registry.
///
/// Assets are produced on the driving thread and never leave it, so they are not required to be
/// `Send`. This keeps types wrapping thread-affine resources (GPU handles, for example) loadable.
pub trait Asset: Downcast {
    /// Called exactly once when the last reference to the asset is released. Assets that own
    /// external resources free them here.
    fn dispose(&mut self) {}
}

downcast_rs::impl_downcast!(Asset);
