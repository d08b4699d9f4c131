pub mod slicevec;
