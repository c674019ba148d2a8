mod callbacks;
mod helpers;
mod payments;
