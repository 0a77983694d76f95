mod helpers;
mod multipart_tests;
mod snapshot_tests;
